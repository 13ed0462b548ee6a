//! Raw record normalization - turns the source's JSON rows into typed
//! observations, converting units and hard-failing on contract drift.
//!
//! The fetch intentionally requests a year window around the target year, so
//! off-year rows are discarded rather than treated as errors. A missing or
//! unparsable numeric value means "not reported" and reads as zero. A unit
//! or location that differs from what the query asked for means the source
//! contract changed underneath us, which is fatal.

use serde::Deserialize;

/// Unit the energy dataset is expected to report in.
pub const ENERGY_UNIT: &str = "Billion Btu";
/// Unit the CO2 dataset is expected to report in.
pub const CO2_UNIT: &str = "million metric tons of CO2";
/// Billion Btu -> GWh.
pub const BTU_BILLION_TO_GWH: f64 = 1.0 / 3.412;

/// One row of the energy dataset as the source serializes it. Values come
/// back as strings, occasionally bare numbers, sometimes null.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnergyRow {
    pub period: String,
    #[serde(rename = "seriesId")]
    pub series_id: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "stateId")]
    pub state_id: String,
}

/// One row of the CO2 aggregates dataset. Note the unit lives under
/// `value-units` here, not `unit` as in the energy dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCo2Row {
    pub period: String,
    #[serde(rename = "sectorId")]
    pub sector_id: String,
    #[serde(rename = "fuelId")]
    pub fuel_id: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "value-units", default)]
    pub value_units: Option<String>,
    #[serde(rename = "stateId")]
    pub state_id: String,
}

/// A normalized energy observation, converted to GWh.
#[derive(Debug, Clone)]
pub struct EnergyObservation {
    pub series_id: String,
    pub gwh: f64,
}

/// A normalized CO2 observation, in million metric tons.
#[derive(Debug, Clone)]
pub struct Co2Observation {
    pub sector_key: String,
    pub fuel_key: String,
    pub mmt: f64,
}

/// Fatal shape mismatch between a raw row and what the query expected.
/// Signals an unannounced source change, not a transient condition.
#[derive(Debug)]
pub enum DataShapeError {
    UnexpectedUnit {
        identifier: String,
        expected: &'static str,
        got: String,
    },
    LocationMismatch {
        identifier: String,
        expected: String,
        got: String,
    },
}

impl std::fmt::Display for DataShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataShapeError::UnexpectedUnit {
                identifier,
                expected,
                got,
            } => write!(
                f,
                "Unexpected unit for {}: expected '{}', got '{}'",
                identifier, expected, got
            ),
            DataShapeError::LocationMismatch {
                identifier,
                expected,
                got,
            } => write!(
                f,
                "Location mismatch for {}: expected '{}', got '{}'",
                identifier, expected, got
            ),
        }
    }
}

impl std::error::Error for DataShapeError {}

/// Normalize energy rows for one (location, year). Off-year rows are
/// skipped; surviving rows are unit-checked and converted to GWh.
pub fn ingest_energy_rows(
    rows: &[RawEnergyRow],
    year: i32,
    location: &str,
) -> Result<Vec<EnergyObservation>, DataShapeError> {
    let mut observations = Vec::new();

    for row in rows {
        if row.period.trim().parse::<i32>().ok() != Some(year) {
            continue;
        }

        let unit = row.unit.as_deref().unwrap_or("");
        if unit != ENERGY_UNIT {
            return Err(DataShapeError::UnexpectedUnit {
                identifier: row.series_id.clone(),
                expected: ENERGY_UNIT,
                got: unit.to_string(),
            });
        }
        if row.state_id != location {
            return Err(DataShapeError::LocationMismatch {
                identifier: row.series_id.clone(),
                expected: location.to_string(),
                got: row.state_id.clone(),
            });
        }

        observations.push(EnergyObservation {
            series_id: row.series_id.clone(),
            gwh: parse_numeric(row.value.as_ref()) * BTU_BILLION_TO_GWH,
        });
    }

    Ok(observations)
}

/// Normalize CO2 rows for one (location, year). Values pass through in
/// million metric tons, no conversion.
pub fn ingest_co2_rows(
    rows: &[RawCo2Row],
    year: i32,
    location: &str,
) -> Result<Vec<Co2Observation>, DataShapeError> {
    let mut observations = Vec::new();

    for row in rows {
        if row.period.trim().parse::<i32>().ok() != Some(year) {
            continue;
        }

        let identifier = format!("{}/{}", row.sector_id, row.fuel_id);
        let unit = row.value_units.as_deref().unwrap_or("");
        if unit != CO2_UNIT {
            return Err(DataShapeError::UnexpectedUnit {
                identifier,
                expected: CO2_UNIT,
                got: unit.to_string(),
            });
        }
        if row.state_id != location {
            return Err(DataShapeError::LocationMismatch {
                identifier,
                expected: location.to_string(),
                got: row.state_id.clone(),
            });
        }

        observations.push(Co2Observation {
            sector_key: row.sector_id.clone(),
            fuel_key: row.fuel_id.clone(),
            mmt: parse_numeric(row.value.as_ref()),
        });
    }

    Ok(observations)
}

// Absent or unparsable values mean "not reported" and read as zero.
fn parse_numeric(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn energy_row(series: &str, period: &str, value: serde_json::Value) -> RawEnergyRow {
        RawEnergyRow {
            period: period.to_string(),
            series_id: series.to_string(),
            value: Some(value),
            unit: Some(ENERGY_UNIT.to_string()),
            state_id: "US".to_string(),
        }
    }

    fn co2_row(sector: &str, fuel: &str, period: &str, value: serde_json::Value) -> RawCo2Row {
        RawCo2Row {
            period: period.to_string(),
            sector_id: sector.to_string(),
            fuel_id: fuel.to_string(),
            value: Some(value),
            value_units: Some(CO2_UNIT.to_string()),
            state_id: "US".to_string(),
        }
    }

    #[test]
    fn test_unit_conversion_round_trip() {
        let rows = vec![energy_row("ESRCB", "2021", json!("3.412"))];
        let obs = ingest_energy_rows(&rows, 2021, "US").unwrap();
        assert_eq!(obs.len(), 1);
        assert!((obs[0].gwh - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_numeric_value_accepted_as_number_or_string() {
        let rows = vec![
            energy_row("ESRCB", "2021", json!(3.412)),
            energy_row("TNRCB", "2021", json!("6.824")),
        ];
        let obs = ingest_energy_rows(&rows, 2021, "US").unwrap();
        assert!((obs[0].gwh - 1.0).abs() < 1e-6);
        assert!((obs[1].gwh - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_unparsable_value_reads_as_zero() {
        let mut row = energy_row("ESRCB", "2021", json!("n/a"));
        let rows = vec![row.clone(), {
            row.value = None;
            row.series_id = "TNRCB".to_string();
            row
        }];
        let obs = ingest_energy_rows(&rows, 2021, "US").unwrap();
        assert_eq!(obs[0].gwh, 0.0);
        assert_eq!(obs[1].gwh, 0.0);
    }

    #[test]
    fn test_off_year_rows_discarded() {
        let rows = vec![
            energy_row("ESRCB", "2020", json!("10")),
            energy_row("ESRCB", "2021", json!("20")),
            energy_row("ESRCB", "2022", json!("30")),
        ];
        let obs = ingest_energy_rows(&rows, 2021, "US").unwrap();
        assert_eq!(obs.len(), 1);
        assert!((obs[0].gwh - 20.0 * BTU_BILLION_TO_GWH).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_energy_unit_is_fatal() {
        let mut row = energy_row("ESRCB", "2021", json!("10"));
        row.unit = Some("Million Btu".to_string());
        let err = ingest_energy_rows(&[row], 2021, "US").unwrap_err();
        assert!(matches!(err, DataShapeError::UnexpectedUnit { .. }));
    }

    #[test]
    fn test_location_mismatch_is_fatal() {
        let mut row = energy_row("ESRCB", "2021", json!("10"));
        row.state_id = "CA".to_string();
        let err = ingest_energy_rows(&[row], 2021, "US").unwrap_err();
        assert!(matches!(err, DataShapeError::LocationMismatch { .. }));
    }

    #[test]
    fn test_co2_value_passes_through_unconverted() {
        let rows = vec![co2_row("RC", "TO", "2021", json!("57.3"))];
        let obs = ingest_co2_rows(&rows, 2021, "US").unwrap();
        assert_eq!(obs[0].sector_key, "RC");
        assert_eq!(obs[0].fuel_key, "TO");
        assert!((obs[0].mmt - 57.3).abs() < 1e-12);
    }

    #[test]
    fn test_co2_wrong_unit_is_fatal() {
        let mut row = co2_row("RC", "TO", "2021", json!("57.3"));
        row.value_units = Some("metric tons of CO2".to_string());
        let err = ingest_co2_rows(&[row], 2021, "US").unwrap_err();
        assert!(matches!(err, DataShapeError::UnexpectedUnit { .. }));
    }

    #[test]
    fn test_rows_deserialize_from_source_envelope_shape() {
        let energy: RawEnergyRow = serde_json::from_str(
            r#"{"period":"2021","seriesId":"ESRCB","seriesDescription":"Electricity consumed by the residential sector",
                "value":"5105.2","unit":"Billion Btu","stateId":"US","stateDescription":"United States"}"#,
        )
        .unwrap();
        assert_eq!(energy.series_id, "ESRCB");

        let co2: RawCo2Row = serde_json::from_str(
            r#"{"period":"2021","sectorId":"EC","sector-name":"Electric Power","fuelId":"TO","fuel-name":"All Fuels",
                "value":1551.5,"value-units":"million metric tons of CO2","stateId":"US"}"#,
        )
        .unwrap();
        assert_eq!(co2.sector_id, "EC");
        assert_eq!(co2.fuel_id, "TO");
    }
}
