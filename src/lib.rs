//! sedflow - reconciles raw annual energy-consumption and CO2-emission
//! observations into a validated hierarchical breakdown per economic
//! sector: electricity drawn from the grid vs. direct fuel combustion,
//! with primary energy further split into named fuel pieces plus a derived
//! residual. Electric-sector emissions arrive as one population-wide
//! figure and are attributed to sectors in proportion to their electric
//! energy shares.
//!
//! # Architecture
//!
//! ```text
//! EIA API → SeriesFetcher (query / fetch)
//!     ↓ raw rows
//! RawSeriesIngest (ingest) - unit conversion + shape checks
//!     ↓ typed observations
//! Aggregator (aggregate) - subtractive derivation + proportional CO2 split
//!     ↓ ScopeBreakdown
//! ConsistencyValidator (validate) - tolerance-bounded sum checks
//!     ↓ validated
//! SnapshotStore (snapshot) - atomic per-scope commit + comparison view
//! ```
//!
//! The pipeline driver (`pipeline`) threads an explicit per-request context
//! through these stages; the snapshot store is the only state shared across
//! runs, and commits are staleness-guarded so a superseded run can never
//! overwrite a newer result.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod ingest;
pub mod pipeline;
pub mod query;
pub mod snapshot;
pub mod validate;

pub use aggregate::{derive_breakdown, FuelPiece, ScopeBreakdown, SectorBreakdown, SubsectorValues};
pub use catalog::{Catalog, FuelKind, PieceSlots, Sector, SectorSeries};
pub use config::{ConfigError, EiaConfig};
pub use fetch::{EiaClient, FetchError, SeriesFetcher};
pub use ingest::{
    ingest_co2_rows, ingest_energy_rows, Co2Observation, DataShapeError, EnergyObservation,
    RawCo2Row, RawEnergyRow, BTU_BILLION_TO_GWH, CO2_UNIT, ENERGY_UNIT,
};
pub use pipeline::{
    latest_complete_year, run_scope_pipeline, run_selection, PipelineContext, PipelineError,
    REFERENCE_LOCATION,
};
pub use query::{DatasetKind, QueryDescriptor};
pub use snapshot::{
    PieceComparison, RequestToken, Scope, ScopeComparison, SectorComparison, Snapshot,
    SnapshotStore, StaleCommit, TierComparison, ValuePair,
};
pub use validate::{validate, ValidationError, CO2_TOLERANCE_MMT, ENERGY_TOLERANCE_GWH};
