/// Token acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential could be obtained from the identity provider
    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// HTTP request to the identity provider failed
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Identity provider returned a non-success response
    #[error("identity provider error ({status}): {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}
