use http::StatusCode;

/// Trait for domain errors that can be converted to HTTP responses
///
/// Only errors raised by the proxy itself implement this. Upstream
/// responses are relayed verbatim and never pass through it.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `upstream_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String {
        self.to_string()
    }
}
