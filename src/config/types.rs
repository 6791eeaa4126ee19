use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LoggingConfig;
use super::storage::StorageConfig;
use crate::session::RefreshSchedule;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "STUDIO_API_URL";
/// Local development backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Errors raised while loading configuration or setting up logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

impl Default for Config {
    fn default() -> Self {
        Config::ConfigV1(ConfigV1::default())
    }
}

/// Main config for v1.0.0. Every section has defaults, so an empty file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to reach the backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// Extra attempts for idempotent resource queries after a transient failure.
    #[serde(default = "default_query_retries")]
    pub query_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_in_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_in_ms: default_timeout_in_ms(),
            query_retries: default_query_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Routes the session store navigates to, and the refresh cadence.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct SessionConfig {
    #[serde(default = "default_landing_route")]
    pub landing_route: String,
    #[serde(default = "default_dashboard_route")]
    pub dashboard_route: String,
    #[serde(default)]
    pub refresh: RefreshSchedule,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            landing_route: default_landing_route(),
            dashboard_route: default_dashboard_route(),
            refresh: RefreshSchedule::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_in_ms() -> u64 {
    30_000
}

fn default_query_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_landing_route() -> String {
    "/".to_string()
}

fn default_dashboard_route() -> String {
    "/dashboard".to_string()
}

/// Defaults, then the YAML file (if it exists), then the environment.
fn layered(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path))
        .merge(
            Env::raw()
                .only(&[API_URL_ENV])
                .map(|_| "api.base_url".into()),
        )
}

fn unwrap_version(config: Config) -> ConfigV1 {
    match config {
        Config::ConfigV1(c) => c,
    }
    // handle configuration migration between versions here when necessary
}

/// Load config from "config.yaml" in the current directory.
pub fn load_config() -> Result<ConfigV1, ConfigError> {
    load_config_from("./config.yaml")
}

/// Load config from the given YAML file, layered over defaults and the environment.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ConfigV1, ConfigError> {
    let config = layered(path.as_ref()).extract::<Config>()?;
    Ok(unwrap_version(config))
}

/// Render the JSON schema for the configuration.
pub fn config_schema() -> String {
    let schema = schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
