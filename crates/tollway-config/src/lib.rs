#![allow(clippy::must_use_candidate)]

pub mod chargeback;
mod duration;
pub mod health;
pub mod identity;
mod loader;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use chargeback::*;
pub use health::*;
pub use identity::*;
pub use proxy::*;
pub use routes::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level tollway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener and liveness endpoint
    #[serde(default)]
    pub server: ServerConfig,
    /// Routes, retry loop and passive health policy
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Credential used to obtain upstream bearer tokens
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Where finished usage records are delivered
    #[serde(default)]
    pub chargeback: ChargebackConfig,
    /// Logging and OTLP export
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
