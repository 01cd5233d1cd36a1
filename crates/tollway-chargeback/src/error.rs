use tollway_auth::AuthError;

/// Errors delivering a usage record to a sink
#[derive(Debug, thiserror::Error)]
pub enum ChargebackError {
    /// HTTP transport or connection error
    #[error("chargeback request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sink returned a non-success status
    #[error("chargeback sink error ({status}): {message}")]
    Api {
        /// HTTP status from the sink
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// No token for the sink could be acquired
    #[error("chargeback credential unavailable: {0}")]
    Credential(#[from] AuthError),

    /// Recent deliveries failed; the record was not attempted
    #[error("chargeback circuit is open")]
    CircuitOpen,
}
