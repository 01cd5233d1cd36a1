//! Routing-specific error types

use thiserror::Error;

/// Errors that can occur while choosing a destination
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The cluster has no destinations to choose from
    #[error("no destinations configured for cluster '{cluster}'")]
    NoDestinationsConfigured { cluster: String },
}
