//! Environment-driven configuration for the EIA client.

use std::env;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_ENERGY_URL: &str = "https://api.eia.gov/v2/seds/data/";
const DEFAULT_CO2_URL: &str = "https://api.eia.gov/v2/co2-emissions/co2-emissions-aggregates/data/";

#[derive(Debug, Clone)]
pub struct EiaConfig {
    pub api_key: String,
    pub energy_base_url: String,
    pub co2_base_url: String,
}

impl EiaConfig {
    /// Read configuration from the environment. `EIA_API_KEY` is required
    /// (obtainable on the EIA site); the dataset URLs default to the public
    /// API and are overridable for testing against a local stub server.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("EIA_API_KEY")
            .map_err(|_| ConfigError::MissingVariable("EIA_API_KEY".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "EIA_API_KEY cannot be empty".to_string(),
            ));
        }

        let energy_base_url =
            env::var("EIA_SEDS_URL").unwrap_or_else(|_| DEFAULT_ENERGY_URL.to_string());
        let co2_base_url =
            env::var("EIA_CO2_URL").unwrap_or_else(|_| DEFAULT_CO2_URL.to_string());

        for url in [&energy_base_url, &co2_base_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "dataset URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        Ok(Self {
            api_key,
            energy_base_url,
            co2_base_url,
        })
    }
}
