//! Upstream transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Transport failure talking to an upstream
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ForwardError(#[from] reqwest::Error);

/// Streamed response body
pub type BodyStream = BoxStream<'static, Result<Bytes, ForwardError>>;

/// One attempt's request, fully prepared for a destination
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream response with its body not yet consumed
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends a prepared request to an upstream and returns once headers arrive
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError>;
}

/// `reqwest`-backed forwarder with connection pooling
#[derive(Clone)]
pub struct ReqwestForwarder {
    client: reqwest::Client,
}

impl ReqwestForwarder {
    /// Build a forwarder
    ///
    /// Redirects are relayed to the caller rather than followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build upstream HTTP client: {e}"))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Forwarder for ReqwestForwarder {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ForwardError> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(ForwardError::from).boxed();

        Ok(UpstreamResponse { status, headers, body })
    }
}
