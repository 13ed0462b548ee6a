//! Fetch collaborator - async source client returning raw rows.
//!
//! The pipeline depends only on the `SeriesFetcher` trait; `EiaClient` is
//! the production implementation against the EIA API v2, and tests drive
//! the pipeline through in-memory stubs instead.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EiaConfig;
use crate::ingest::{RawCo2Row, RawEnergyRow};
use crate::query::QueryDescriptor;

/// A fetch failed in transport, at the HTTP layer, or while decoding the
/// response envelope. Not retried: the pipeline run aborts.
#[derive(Debug)]
pub struct FetchError {
    pub dataset: &'static str,
    pub source: reqwest::Error,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} fetch failed: {}", self.dataset, self.source)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Returns raw records for the pipeline. Implementations must cover every
/// identifier the query descriptor carries; extra rows are tolerated.
#[async_trait]
pub trait SeriesFetcher: Send + Sync {
    async fn fetch_energy(&self, query: &QueryDescriptor)
        -> Result<Vec<RawEnergyRow>, FetchError>;
    async fn fetch_co2(&self, query: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError>;
}

// The source wraps row arrays in { "response": { "data": [...] } }.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Payload<T>,
}

#[derive(Debug, Deserialize)]
struct Payload<T> {
    data: Vec<T>,
}

/// Production fetcher against the EIA API v2.
pub struct EiaClient {
    http: reqwest::Client,
    config: EiaConfig,
}

impl EiaClient {
    pub fn new(config: EiaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(
        &self,
        dataset: &'static str,
        url: String,
    ) -> Result<Vec<T>, FetchError> {
        let wrap = |source| FetchError { dataset, source };

        let response = self.http.get(&url).send().await.map_err(wrap)?;
        let envelope: Envelope<T> = response
            .error_for_status()
            .map_err(wrap)?
            .json()
            .await
            .map_err(wrap)?;

        log::debug!(
            "📥 {} fetch returned {} rows",
            dataset,
            envelope.response.data.len()
        );
        Ok(envelope.response.data)
    }
}

#[async_trait]
impl SeriesFetcher for EiaClient {
    async fn fetch_energy(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Vec<RawEnergyRow>, FetchError> {
        let url = query.to_url(&self.config.energy_base_url, &self.config.api_key);
        self.get_rows("energy", url).await
    }

    async fn fetch_co2(&self, query: &QueryDescriptor) -> Result<Vec<RawCo2Row>, FetchError> {
        let url = query.to_url(&self.config.co2_base_url, &self.config.api_key);
        self.get_rows("co2", url).await
    }
}
