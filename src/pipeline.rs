//! Pipeline driver - one authoritative derivation per (scope, year).
//!
//! A run is a single logical sequence: fetch both datasets concurrently,
//! suspend until both complete (the CO2 split needs fully-populated energy
//! values), ingest, derive, validate, commit. No retry policy: any fatal
//! error aborts the run and the snapshot store keeps its last committed
//! values, so the display never goes blank on a source hiccup.

use std::collections::{HashMap, HashSet};

use crate::aggregate::derive_breakdown;
use crate::catalog::Catalog;
use crate::fetch::{FetchError, SeriesFetcher};
use crate::ingest::{ingest_co2_rows, ingest_energy_rows, DataShapeError};
use crate::query::{complete_year_identifier_count, QueryDescriptor};
use crate::snapshot::{Scope, Snapshot, SnapshotStore, StaleCommit};
use crate::validate::{validate, ValidationError};

/// Location code of the reference population.
pub const REFERENCE_LOCATION: &str = "US";

/// Explicit per-request context threaded through the pipeline. There is no
/// ambient current-scope state; concurrent runs share only the store.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub location: String,
    pub year: i32,
}

#[derive(Debug)]
pub enum PipelineError {
    Fetch(FetchError),
    Shape(DataShapeError),
    Validation(ValidationError),
    /// A newer request took over the slot while this run was in flight.
    /// The store was not touched.
    StaleRequest(StaleCommit),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Fetch(e) => write!(f, "{}", e),
            PipelineError::Shape(e) => write!(f, "{}", e),
            PipelineError::Validation(e) => write!(f, "{}", e),
            PipelineError::StaleRequest(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Fetch(e) => Some(e),
            PipelineError::Shape(e) => Some(e),
            PipelineError::Validation(e) => Some(e),
            PipelineError::StaleRequest(e) => Some(e),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        PipelineError::Fetch(e)
    }
}

impl From<DataShapeError> for PipelineError {
    fn from(e: DataShapeError) -> Self {
        PipelineError::Shape(e)
    }
}

impl From<ValidationError> for PipelineError {
    fn from(e: ValidationError) -> Self {
        PipelineError::Validation(e)
    }
}

impl From<StaleCommit> for PipelineError {
    fn from(e: StaleCommit) -> Self {
        PipelineError::StaleRequest(e)
    }
}

/// Fetch, derive, validate and commit one scope. The request token is
/// taken before the fetches start, so a later request for the same slot
/// supersedes this one even if this one finishes afterwards.
pub async fn run_scope_pipeline(
    fetcher: &dyn SeriesFetcher,
    catalog: &Catalog,
    store: &SnapshotStore,
    scope: Scope,
    ctx: &PipelineContext,
) -> Result<(), PipelineError> {
    let token = store.begin_request(scope);
    log::info!(
        "🚀 Deriving {} scope: {} / {}",
        scope,
        ctx.location,
        ctx.year
    );

    let energy_query = QueryDescriptor::energy(catalog, &ctx.location, ctx.year);
    let co2_query = QueryDescriptor::co2(catalog, &ctx.location, ctx.year);

    // Independent fetches, issued concurrently; derivation waits for both.
    let (energy_rows, co2_rows) = tokio::try_join!(
        fetcher.fetch_energy(&energy_query),
        fetcher.fetch_co2(&co2_query)
    )?;

    let energy = ingest_energy_rows(&energy_rows, ctx.year, &ctx.location)?;
    let co2 = ingest_co2_rows(&co2_rows, ctx.year, &ctx.location)?;

    let breakdown = derive_breakdown(catalog, &energy, &co2)?;
    validate(&breakdown)?;

    store.commit(
        scope,
        Snapshot {
            location: ctx.location.clone(),
            year: ctx.year,
            sectors: breakdown,
        },
        token,
    )?;

    log::info!("✅ Committed {} scope ({} / {})", scope, ctx.location, ctx.year);
    Ok(())
}

/// Full selection flow: derive the reference population, then either
/// duplicate it into the selected slot (selected scope coincides with the
/// reference - zero additional fetches) or run the selected scope's own
/// pipeline.
pub async fn run_selection(
    fetcher: &dyn SeriesFetcher,
    catalog: &Catalog,
    store: &SnapshotStore,
    location: &str,
    year: i32,
) -> Result<(), PipelineError> {
    let reference = PipelineContext {
        location: REFERENCE_LOCATION.to_string(),
        year,
    };
    run_scope_pipeline(fetcher, catalog, store, Scope::Reference, &reference).await?;

    if location == REFERENCE_LOCATION {
        if store.duplicate(Scope::Reference, Scope::Selected) {
            log::info!(
                "📋 Selected scope matches reference population, duplicated without refetch"
            );
        } else {
            // the reference commit above succeeded, so the only way the
            // copy is refused is a newer request owning the selected slot
            log::warn!("⚠️  Selected slot claimed by a newer request, duplicate skipped");
        }
    } else {
        let selected = PipelineContext {
            location: location.to_string(),
            year,
        };
        run_scope_pipeline(fetcher, catalog, store, Scope::Selected, &selected).await?;
    }

    Ok(())
}

/// Probe both datasets for the latest year in which every large-scale
/// identifier reports a value. The coverage queries return all periods for
/// the subsector series and sector CO2 keys; a year counts as complete only
/// when all of them appear.
pub async fn latest_complete_year(
    fetcher: &dyn SeriesFetcher,
    catalog: &Catalog,
) -> Result<Option<i32>, PipelineError> {
    let energy_probe = QueryDescriptor::energy_coverage(catalog, REFERENCE_LOCATION);
    let co2_probe = QueryDescriptor::co2_coverage(catalog, REFERENCE_LOCATION);

    let (energy_rows, co2_rows) = tokio::try_join!(
        fetcher.fetch_energy(&energy_probe),
        fetcher.fetch_co2(&co2_probe)
    )?;

    let mut identifiers_by_year: HashMap<i32, HashSet<String>> = HashMap::new();
    for row in &energy_rows {
        if let Ok(year) = row.period.trim().parse::<i32>() {
            identifiers_by_year
                .entry(year)
                .or_default()
                .insert(row.series_id.clone());
        }
    }
    for row in &co2_rows {
        if let Ok(year) = row.period.trim().parse::<i32>() {
            // a year missing from the energy probe is incomplete regardless
            if let Some(identifiers) = identifiers_by_year.get_mut(&year) {
                identifiers.insert(row.sector_id.clone());
            }
        }
    }

    let required = complete_year_identifier_count();
    let latest = identifiers_by_year
        .into_iter()
        .filter(|(_, identifiers)| identifiers.len() == required)
        .map(|(year, _)| year)
        .max();

    Ok(latest)
}
