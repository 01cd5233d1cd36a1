use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Scope requested for the Logs Ingestion API
pub const DEFAULT_INGESTION_SCOPE: &str = "https://monitor.azure.com/.default";

/// Destination for finished usage records
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChargebackConfig {
    /// Write records to the application log only
    #[default]
    Log,
    /// Azure Monitor Logs Ingestion API
    LogIngestion(LogIngestionConfig),
}

/// Logs Ingestion sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogIngestionConfig {
    /// Data collection endpoint
    pub endpoint: Url,
    /// Immutable id of the data collection rule
    pub rule_id: String,
    /// Stream declared by the data collection rule
    pub stream: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-upload timeout
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub timeout: Duration,
}

fn default_scope() -> String {
    DEFAULT_INGESTION_SCOPE.to_owned()
}

fn default_api_version() -> String {
    "2023-01-01".to_owned()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
