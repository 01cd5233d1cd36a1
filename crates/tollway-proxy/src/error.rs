use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;
use tollway_auth::AuthError;
use tollway_core::HttpError;
use tollway_routing::RoutingError;

/// Failures raised by the proxy itself
///
/// Upstream responses, including error statuses, are relayed as received
/// and never become a `ProxyError`.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No route matches the deployment in the path
    #[error("deployment not found: {deployment}")]
    UnknownDeployment { deployment: String },

    /// The route has no destinations to send to
    #[error(transparent)]
    NoDestinations(#[from] RoutingError),

    /// No bearer token could be obtained for the upstream
    #[error("upstream credential unavailable")]
    CredentialUnavailable(#[source] AuthError),

    /// The last attempt produced no upstream response
    #[error("upstream unreachable: {destination}")]
    Transport {
        destination: String,
        #[source]
        source: crate::forward::ForwardError,
    },

    /// The attempt loop ran past its budget
    #[error("upstream did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The inbound request could not be read
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownDeployment { .. } => StatusCode::NOT_FOUND,
            Self::NoDestinations(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::CredentialUnavailable(_) | Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::UnknownDeployment { .. } => "not_found_error",
            Self::NoDestinations(_) => "no_destinations",
            Self::CredentialUnavailable(_) => "credential_unavailable",
            Self::Transport { .. } => "upstream_error",
            Self::Timeout { .. } => "timeout_error",
            Self::InvalidRequest(_) => "invalid_request_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Transport { .. } => "upstream unreachable".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "code": serde_json::Value::Null,
            }
        });

        (status, Json(body)).into_response()
    }
}
