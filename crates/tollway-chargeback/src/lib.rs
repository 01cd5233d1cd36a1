#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod circuit;
pub mod emitter;
pub mod error;
pub mod ingestion;
pub mod sink;

use std::sync::Arc;

use tollway_auth::TokenCache;
use tollway_config::{ChargebackConfig, IdentityConfig};

pub use emitter::ChargebackEmitter;
pub use error::ChargebackError;
pub use ingestion::LogIngestionSink;
pub use sink::{LogSink, TelemetrySink};

/// Build the sink selected by the charge-back configuration
///
/// The Logs Ingestion sink gets its own token cache for the monitor scope,
/// backed by the same identity as upstream calls.
///
/// # Errors
///
/// Returns an error if the identity source or HTTP client cannot be built
pub fn sink_from_config(
    config: &ChargebackConfig,
    identity: &IdentityConfig,
) -> anyhow::Result<Arc<dyn TelemetrySink>> {
    match config {
        ChargebackConfig::Log => Ok(Arc::new(LogSink)),
        ChargebackConfig::LogIngestion(ingestion) => {
            let source = tollway_auth::source_from_config(identity)?;
            let tokens = Arc::new(TokenCache::new(source, ingestion.scope.clone(), identity.refresh_skew()));
            Ok(Arc::new(LogIngestionSink::new(ingestion, tokens)?))
        }
    }
}
