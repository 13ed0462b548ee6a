//! Integration tests for the full derivation pipeline.
//!
//! A stub fetcher stands in for the EIA API and serves a synthetic but
//! internally consistent fixture, so the tests can drive fetch → ingest →
//! derive → validate → commit end to end and assert on:
//! - hierarchy invariants holding for both scopes after a run
//! - the zero-refetch duplicate path when the selected scope is the
//!   reference population
//! - fatal shape/validation errors leaving prior commits untouched
//! - staleness guarding between overlapping runs

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sedflow::{
    latest_complete_year, run_scope_pipeline, run_selection, Catalog, FetchError, FuelKind,
    PipelineContext, PipelineError, QueryDescriptor, RawCo2Row, RawEnergyRow, Scope, Sector,
    SeriesFetcher, Snapshot, SnapshotStore, CO2_TOLERANCE_MMT, ENERGY_TOLERANCE_GWH,
};

const YEAR: i32 = 2021;

fn energy_row(location: &str, period: &str, series: &str, value: f64) -> RawEnergyRow {
    serde_json::from_value(serde_json::json!({
        "period": period,
        "seriesId": series,
        "value": format!("{}", value),
        "unit": "Billion Btu",
        "stateId": location,
    }))
    .unwrap()
}

fn co2_row(location: &str, period: &str, sector: &str, fuel: &str, value: f64) -> RawCo2Row {
    serde_json::from_value(serde_json::json!({
        "period": period,
        "sectorId": sector,
        "fuelId": fuel,
        "value": format!("{}", value),
        "value-units": "million metric tons of CO2",
        "stateId": location,
    }))
    .unwrap()
}

/// Serves a consistent fixture scaled per location (states report a tenth
/// of the national values), with flags to inject the two fatal conditions.
struct StubFetcher {
    energy_calls: AtomicUsize,
    co2_calls: AtomicUsize,
    bad_energy_unit: bool,
    oversized_natural_gas: bool,
}

impl StubFetcher {
    fn new() -> Self {
        StubFetcher {
            energy_calls: AtomicUsize::new(0),
            co2_calls: AtomicUsize::new(0),
            bad_energy_unit: false,
            oversized_natural_gas: false,
        }
    }

    fn scale_for(location: &str) -> f64 {
        if location == "US" {
            1.0
        } else {
            0.1
        }
    }

    fn energy_fixture(&self, location: &str) -> Vec<RawEnergyRow> {
        let s = Self::scale_for(location);
        let year = YEAR.to_string();
        let row = |series: &str, value: f64| energy_row(location, &year, series, value * s);

        // Billion Btu, arranged so electric + pieces + residual = total per
        // sector exactly (residual emerges from total - electric - pieces).
        let natural_gas_industrial = if self.oversized_natural_gas {
            90_000.0
        } else {
            9_100.0
        };

        let mut rows = vec![
            // residential
            row("ESRCB", 5_000.0),
            row("TNRCB", 11_000.0),
            row("SORCB", 200.0),
            row("GERCB", 150.0),
            row("CLRCB", 100.0),
            row("NGRCB", 4_500.0),
            row("SFRCB", 300.0),
            row("PARCB", 900.0),
            // commercial
            row("ESCCB", 4_400.0),
            row("TNCCB", 8_900.0),
            row("WYCCB", 50.0),
            row("SOCCB", 100.0),
            row("GECCB", 120.0),
            row("HYCCB", 30.0),
            row("CLCCB", 80.0),
            row("NGCCB", 3_300.0),
            row("SFCCB", 100.0),
            row("PACCB", 700.0),
            // industrial
            row("ESISB", 3_300.0),
            row("TNICB", 22_300.0),
            row("WYICB", 200.0),
            row("SOICB", 60.0),
            row("GEICB", 40.0),
            row("HYICB", 110.0),
            row("CLICB", 1_200.0),
            row("NGICB", natural_gas_industrial),
            row("SFINB", 600.0),
            row("PAICB", 8_000.0),
            // transportation
            row("ESACB", 90.0),
            row("TNACB", 25_100.0),
            row("CLACB", 10.0),
            row("NGASB", 900.0),
            row("PAACB", 24_000.0),
            // off-year row inside the fetch window, must be discarded
            energy_row(location, "2020", "TNRCB", 999_999.0),
            // identifier the catalog does not bind, must be ignored
            energy_row(location, &year, "NUETB", 123_456.0),
        ];

        if self.bad_energy_unit {
            rows[0].unit = Some("Million Btu".to_string());
        }
        rows
    }

    fn co2_fixture(&self, location: &str) -> Vec<RawCo2Row> {
        let s = Self::scale_for(location);
        let year = YEAR.to_string();
        let row =
            |sector: &str, fuel: &str, value: f64| co2_row(location, &year, sector, fuel, value * s);

        vec![
            // population-wide electric generation figure, split proportionally
            row("EC", "TO", 1_500.0),
            // per-sector primary totals and tracked fuels
            row("RC", "TO", 320.0),
            row("RC", "CO", 0.5),
            row("RC", "NG", 250.0),
            row("RC", "PE", 60.0),
            row("CC", "TO", 230.0),
            row("CC", "CO", 2.0),
            row("CC", "NG", 170.0),
            row("CC", "PE", 50.0),
            row("IC", "TO", 1_350.0),
            row("IC", "CO", 120.0),
            row("IC", "NG", 750.0),
            row("IC", "PE", 430.0),
            row("TC", "TO", 1_800.0),
            row("TC", "CO", 0.1),
            row("TC", "NG", 50.0),
            row("TC", "PE", 1_740.0),
            // off-year decoy
            co2_row(location, "2020", "RC", "TO", 888.0),
        ]
    }
}

#[async_trait]
impl SeriesFetcher for StubFetcher {
    async fn fetch_energy(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Vec<RawEnergyRow>, FetchError> {
        self.energy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.energy_fixture(&query.location))
    }

    async fn fetch_co2(&self, query: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError> {
        self.co2_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.co2_fixture(&query.location))
    }
}

fn assert_hierarchy_invariants(snapshot: &Snapshot) {
    for sector in Sector::ALL {
        let sb = snapshot.sectors.sector(sector);

        let energy_gap = sb.electric.energy_gwh + sb.primary.energy_gwh - sb.total.energy_gwh;
        assert!(
            energy_gap.abs() <= ENERGY_TOLERANCE_GWH,
            "energy sum broken in {}: gap {}",
            sector,
            energy_gap
        );

        let co2_gap = sb.electric.co2_mmt + sb.primary.co2_mmt - sb.total.co2_mmt;
        assert!(
            co2_gap.abs() <= CO2_TOLERANCE_MMT,
            "co2 sum broken in {}: gap {}",
            sector,
            co2_gap
        );

        let piece_energy: f64 = sb.pieces().map(|(_, p)| p.energy_gwh).sum();
        assert!(
            (piece_energy - sb.primary.energy_gwh).abs() <= ENERGY_TOLERANCE_GWH,
            "piece energy sum broken in {}",
            sector
        );

        let piece_co2: f64 = sb.pieces().map(|(_, p)| p.co2_mmt).sum();
        assert!(
            (piece_co2 - sb.primary.co2_mmt).abs() <= CO2_TOLERANCE_MMT,
            "piece co2 sum broken in {}",
            sector
        );

        assert!(sb.piece(FuelKind::Other).energy_gwh >= -ENERGY_TOLERANCE_GWH);
    }
}

#[tokio::test]
async fn test_us_selection_duplicates_without_refetch() {
    let fetcher = StubFetcher::new();
    let catalog = Catalog::us_seds();
    let store = SnapshotStore::new();

    run_selection(&fetcher, &catalog, &store, "US", YEAR)
        .await
        .unwrap();

    // one energy + one co2 fetch total: the selected slot was duplicated
    assert_eq!(fetcher.energy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.co2_calls.load(Ordering::SeqCst), 1);

    let selected = store.read(Scope::Selected).unwrap();
    let reference = store.read(Scope::Reference).unwrap();
    assert_eq!(selected.location, "US");
    assert_hierarchy_invariants(&selected);
    assert_hierarchy_invariants(&reference);

    for sector in Sector::ALL {
        let sel = selected.sectors.sector(sector);
        let refr = reference.sectors.sector(sector);
        assert_eq!(sel.total.energy_gwh, refr.total.energy_gwh);
        assert_eq!(sel.electric.co2_mmt, refr.electric.co2_mmt);
    }
}

#[tokio::test]
async fn test_attributed_electric_co2_sums_to_population_figure() {
    let fetcher = StubFetcher::new();
    let catalog = Catalog::us_seds();
    let store = SnapshotStore::new();

    run_selection(&fetcher, &catalog, &store, "US", YEAR)
        .await
        .unwrap();

    let snapshot = store.read(Scope::Reference).unwrap();
    let attributed: f64 = Sector::ALL
        .iter()
        .map(|s| snapshot.sectors.sector(*s).electric.co2_mmt)
        .sum();
    assert!((attributed - 1_500.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_state_selection_runs_both_scopes() {
    let fetcher = StubFetcher::new();
    let catalog = Catalog::us_seds();
    let store = SnapshotStore::new();

    run_selection(&fetcher, &catalog, &store, "CA", YEAR)
        .await
        .unwrap();

    assert_eq!(fetcher.energy_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.co2_calls.load(Ordering::SeqCst), 2);

    let selected = store.read(Scope::Selected).unwrap();
    let reference = store.read(Scope::Reference).unwrap();
    assert_eq!(selected.location, "CA");
    assert_eq!(reference.location, "US");
    assert_hierarchy_invariants(&selected);

    // the state fixture is a tenth of the national one
    let ratio = selected
        .sectors
        .sector(Sector::Residential)
        .total
        .energy_gwh
        / reference
            .sectors
            .sector(Sector::Residential)
            .total
            .energy_gwh;
    assert!((ratio - 0.1).abs() < 1e-9);

    let view = store.comparison().unwrap();
    assert_eq!(view.location, "CA");
    assert_eq!(view.reference_location, "US");
}

#[tokio::test]
async fn test_shape_error_leaves_prior_snapshot_untouched() {
    let catalog = Catalog::us_seds();
    let store = SnapshotStore::new();

    let good = StubFetcher::new();
    run_selection(&good, &catalog, &store, "US", YEAR)
        .await
        .unwrap();
    let before = store.read(Scope::Reference).unwrap();

    let mut bad = StubFetcher::new();
    bad.bad_energy_unit = true;
    let err = run_selection(&bad, &catalog, &store, "US", YEAR)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Shape(_)));

    let after = store.read(Scope::Reference).unwrap();
    assert_eq!(
        before.sectors.sector(Sector::Residential).total.energy_gwh,
        after.sectors.sector(Sector::Residential).total.energy_gwh
    );
}

#[tokio::test]
async fn test_oversized_piece_fails_validation_without_commit() {
    let catalog = Catalog::us_seds();
    let store = SnapshotStore::new();

    let mut fetcher = StubFetcher::new();
    fetcher.oversized_natural_gas = true;

    let err = run_selection(&fetcher, &catalog, &store, "US", YEAR)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(store.read(Scope::Reference).is_none());
}

fn probe_energy_row(period: &str, series: &str) -> RawEnergyRow {
    serde_json::from_value(serde_json::json!({
        "period": period,
        "seriesId": series,
        "stateId": "US",
    }))
    .unwrap()
}

fn probe_co2_row(period: &str, sector: &str) -> RawCo2Row {
    serde_json::from_value(serde_json::json!({
        "period": period,
        "sectorId": sector,
        "fuelId": "TO",
        "stateId": "US",
    }))
    .unwrap()
}

/// Serves only the coverage probes: period/identifier pairs with no
/// values, the shape the source returns when no data column is requested.
/// 2019 and 2020 are fully covered on both sides; 2021 misses one CO2
/// sector and 2022 appears in the CO2 dataset alone.
struct CoverageStubFetcher;

#[async_trait]
impl SeriesFetcher for CoverageStubFetcher {
    async fn fetch_energy(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Vec<RawEnergyRow>, FetchError> {
        let mut rows = Vec::new();
        for period in ["2019", "2020", "2021"] {
            for series in &query.series_ids {
                rows.push(probe_energy_row(period, series));
            }
        }
        Ok(rows)
    }

    async fn fetch_co2(&self, query: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError> {
        let mut rows = Vec::new();
        for period in ["2019", "2020"] {
            for sector in &query.sector_keys {
                rows.push(probe_co2_row(period, sector));
            }
        }
        // 2021 reports every sector but transportation
        for sector in ["EC", "RC", "CC", "IC"] {
            rows.push(probe_co2_row("2021", sector));
        }
        // 2022 has no energy coverage at all, so it must not count
        for sector in &query.sector_keys {
            rows.push(probe_co2_row("2022", sector));
        }
        Ok(rows)
    }
}

#[tokio::test]
async fn test_latest_complete_year_skips_partially_covered_years() {
    let catalog = Catalog::us_seds();
    let year = latest_complete_year(&CoverageStubFetcher, &catalog)
        .await
        .unwrap();
    assert_eq!(year, Some(2020));
}

/// Reports nothing on either side.
struct EmptyFetcher;

#[async_trait]
impl SeriesFetcher for EmptyFetcher {
    async fn fetch_energy(&self, _: &QueryDescriptor) -> Result<Vec<RawEnergyRow>, FetchError> {
        Ok(Vec::new())
    }

    async fn fetch_co2(&self, _: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_latest_complete_year_none_without_any_coverage() {
    let catalog = Catalog::us_seds();
    let year = latest_complete_year(&EmptyFetcher, &catalog).await.unwrap();
    assert_eq!(year, None);
}

/// A fetcher that delays its responses, to model a slow in-flight run
/// being overtaken by a newer request for the same slot.
struct SlowFetcher {
    inner: StubFetcher,
    delay_ms: u64,
}

#[async_trait]
impl SeriesFetcher for SlowFetcher {
    async fn fetch_energy(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Vec<RawEnergyRow>, FetchError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        self.inner.fetch_energy(query).await
    }

    async fn fetch_co2(&self, query: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        self.inner.fetch_co2(query).await
    }
}

#[tokio::test]
async fn test_superseded_run_cannot_overwrite_newer_commit() {
    let catalog = std::sync::Arc::new(Catalog::us_seds());
    let store = std::sync::Arc::new(SnapshotStore::new());

    let slow = SlowFetcher {
        inner: StubFetcher::new(),
        delay_ms: 300,
    };

    let slow_run = {
        let catalog = catalog.clone();
        let store = store.clone();
        tokio::spawn(async move {
            let ctx = PipelineContext {
                location: "TX".to_string(),
                year: YEAR,
            };
            run_scope_pipeline(&slow, &catalog, &store, Scope::Selected, &ctx).await
        })
    };

    // give the slow run time to take its token, then supersede it
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let fast = StubFetcher::new();
    let ctx = PipelineContext {
        location: "CA".to_string(),
        year: YEAR,
    };
    run_scope_pipeline(&fast, &catalog, &store, Scope::Selected, &ctx)
        .await
        .unwrap();

    let slow_result = slow_run.await.unwrap();
    assert!(matches!(slow_result, Err(PipelineError::StaleRequest(_))));
    assert_eq!(store.read(Scope::Selected).unwrap().location, "CA");
}
