//! Query descriptors for the fetch collaborator.
//!
//! The core never talks to the network itself; it produces these opaque
//! request shapes and requires only that the fetcher return raw rows
//! covering every identifier the catalog binds for the requested scope.
//! `to_url` renders the EIA API v2 query string: annual frequency, period
//! sort descending, one facet entry per identifier.

use crate::catalog::{Catalog, FuelKind, Sector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Energy,
    Co2,
}

/// One fetch request. Energy queries facet on series ids; CO2 queries facet
/// on sector and fuel keys. Coverage probes carry no value column and no
/// year bounds: they return the full period range for the large-scale
/// identifiers only, which is how the latest complete year is found.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    pub dataset: DatasetKind,
    pub value_column: Option<&'static str>,
    pub location: String,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub series_ids: Vec<&'static str>,
    pub sector_keys: Vec<&'static str>,
    pub fuel_keys: Vec<&'static str>,
}

impl QueryDescriptor {
    /// Energy query for a ±1-year window around the target year. The window
    /// makes the fetch robust against source gaps; ingest filters back down
    /// to the target year.
    pub fn energy(catalog: &Catalog, location: &str, year: i32) -> Self {
        QueryDescriptor {
            dataset: DatasetKind::Energy,
            value_column: Some("value"),
            location: location.to_string(),
            year_start: Some(year - 1),
            year_end: Some(year + 1),
            series_ids: catalog.energy_series_ids(),
            sector_keys: Vec::new(),
            fuel_keys: Vec::new(),
        }
    }

    /// CO2 query for the same window.
    pub fn co2(catalog: &Catalog, location: &str, year: i32) -> Self {
        QueryDescriptor {
            dataset: DatasetKind::Co2,
            value_column: Some("value"),
            location: location.to_string(),
            year_start: Some(year - 1),
            year_end: Some(year + 1),
            series_ids: Vec::new(),
            sector_keys: catalog.co2_sector_keys(),
            fuel_keys: catalog.co2_fuel_keys(),
        }
    }

    /// Energy coverage probe: subsector series only, all years, no values.
    pub fn energy_coverage(catalog: &Catalog, location: &str) -> Self {
        let mut series_ids = Vec::new();
        for sector in Sector::ALL {
            let series = catalog.series(sector);
            series_ids.push(series.electric);
            series_ids.push(series.total);
        }
        QueryDescriptor {
            dataset: DatasetKind::Energy,
            value_column: None,
            location: location.to_string(),
            year_start: None,
            year_end: None,
            series_ids,
            sector_keys: Vec::new(),
            fuel_keys: Vec::new(),
        }
    }

    /// CO2 coverage probe: sector keys and the all-fuels key only.
    pub fn co2_coverage(catalog: &Catalog, location: &str) -> Self {
        QueryDescriptor {
            dataset: DatasetKind::Co2,
            value_column: None,
            location: location.to_string(),
            year_start: None,
            year_end: None,
            series_ids: Vec::new(),
            sector_keys: catalog.co2_sector_keys(),
            fuel_keys: vec![catalog.co2_all_fuels],
        }
    }

    /// Render the EIA v2 query string against a dataset base URL.
    pub fn to_url(&self, base: &str, api_key: &str) -> String {
        let mut url = format!(
            "{}?api_key={}&frequency=annual&sort[0][column]=period&sort[0][direction]=desc&offset=0",
            base, api_key
        );

        if let Some(column) = self.value_column {
            url.push_str(&format!("&data[0]={}", column));
        }
        url.push_str(&format!("&facets[stateId][]={}", self.location));
        if let Some(start) = self.year_start {
            url.push_str(&format!("&start={}", start));
        }
        if let Some(end) = self.year_end {
            url.push_str(&format!("&end={}", end));
        }

        for id in &self.series_ids {
            url.push_str(&format!("&facets[seriesId][]={}", id));
        }
        for key in &self.sector_keys {
            url.push_str(&format!("&facets[sectorId][]={}", key));
        }
        for key in &self.fuel_keys {
            url.push_str(&format!("&facets[fuelId][]={}", key));
        }

        url
    }
}

/// Number of identifiers a complete year must cover in the coverage
/// probes: electric and total series per sector on the energy side, one
/// key per sector plus the electric-generation key on the CO2 side.
pub fn complete_year_identifier_count() -> usize {
    Sector::ALL.len() * 2 + Sector::ALL.len() + 1
}

/// Sanity helper: every identifier the catalog binds appears in the energy
/// descriptor's facet list.
pub fn energy_query_covers_catalog(catalog: &Catalog, query: &QueryDescriptor) -> bool {
    for sector in Sector::ALL {
        let series = catalog.series(sector);
        if !query.series_ids.contains(&series.electric)
            || !query.series_ids.contains(&series.total)
        {
            return false;
        }
        for fuel in FuelKind::ALL {
            for id in series.piece_slots(fuel).ids() {
                if !query.series_ids.contains(&id) {
                    return false;
                }
            }
        }
    }
    true
}
