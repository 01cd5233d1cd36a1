use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use tollway_auth::{AuthError, TokenCache};
use tollway_config::ProxyConfig;
use tollway_routing::{Cluster, Destination, DestinationSelector, HealthTracker, Outcome};
use tollway_telemetry::{Counter, KeyValue, metrics};
use url::Url;

use crate::error::ProxyError;
use crate::forward::{Forwarder, UpstreamRequest, UpstreamResponse};

/// Bounds on the attempt loop
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Ceiling on attempts; the cluster size always bounds them too
    pub max_attempts: Option<u32>,
    /// Delay before each retry
    pub backoff: Duration,
    /// Budget for the whole loop
    pub timeout: Duration,
}

impl RetryPolicy {
    const fn allows_another(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::ZERO,
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&ProxyConfig> for RetryPolicy {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.retry_backoff,
            timeout: config.request_timeout,
        }
    }
}

/// Inbound request, read and rewritten once, replayed on every attempt
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Inbound path and query, appended to the destination address
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response chosen for the caller
#[derive(Debug)]
pub struct Delivery {
    pub response: UpstreamResponse,
    /// Destination that produced the response
    pub destination: String,
    pub attempts: u32,
}

/// Drives Select → Forward → Evaluate until a response can be delivered
pub struct RetryController {
    health: Arc<HealthTracker>,
    tokens: Arc<TokenCache>,
    forwarder: Arc<dyn Forwarder>,
    policy: RetryPolicy,
    attempts_total: Counter<u64>,
    retries_total: Counter<u64>,
    degraded_total: Counter<u64>,
}

impl RetryController {
    pub fn new(
        health: Arc<HealthTracker>,
        tokens: Arc<TokenCache>,
        forwarder: Arc<dyn Forwarder>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            health,
            tokens,
            forwarder,
            policy,
            attempts_total: metrics::counter(metrics::UPSTREAM_ATTEMPTS, "Requests sent to upstream destinations"),
            retries_total: metrics::counter(metrics::UPSTREAM_RETRIES, "Attempts that were followed by a retry"),
            degraded_total: metrics::counter(
                metrics::CLUSTER_DEGRADED,
                "Selections made while every destination was unhealthy",
            ),
        }
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Run the attempt loop for one request within the policy's time budget
    ///
    /// # Errors
    ///
    /// Fails when the cluster is empty, no token can be obtained, the final
    /// attempt gets no response, or the budget runs out. Upstream error
    /// statuses are delivered, not returned as errors.
    pub async fn execute(&self, cluster: &Cluster, request: &PreparedRequest) -> Result<Delivery, ProxyError> {
        let timeout = self.policy.timeout;

        tokio::time::timeout(timeout, self.attempt_loop(cluster, request))
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(cluster = %cluster.id, timeout_secs = timeout.as_secs(), "request budget exhausted");
                Err(ProxyError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            })
    }

    async fn attempt_loop(&self, cluster: &Cluster, request: &PreparedRequest) -> Result<Delivery, ProxyError> {
        let cluster_attr = KeyValue::new("cluster", cluster.id.clone());
        let mut attempted: Vec<String> = Vec::new();

        loop {
            let exclude: Vec<&str> = attempted.iter().map(String::as_str).collect();
            let selection = DestinationSelector::select(cluster, &self.health, &exclude)?;
            if selection.degraded {
                self.degraded_total.add(1, std::slice::from_ref(&cluster_attr));
            }

            let destination = selection.destination;
            attempted.push(destination.id.clone());
            let attempt = u32::try_from(attempted.len()).unwrap_or(u32::MAX);

            let token = self.tokens.token().await.map_err(ProxyError::CredentialUnavailable)?;
            let upstream = build_upstream_request(destination, request, &token.bearer())?;

            tracing::debug!(
                cluster = %cluster.id,
                destination = %destination.address,
                attempt,
                "forwarding request"
            );

            let result = self.forwarder.forward(upstream).await;

            let (outcome, status_class) = match &result {
                Ok(response) => (
                    Outcome::from_response(response.status, &response.headers),
                    metrics::status_class(response.status.as_u16()),
                ),
                Err(_) => (Outcome::RetryableFailure { retry_after: None }, "transport"),
            };

            self.health.observe(&destination.id, outcome);
            self.attempts_total
                .add(1, &[cluster_attr.clone(), KeyValue::new("status", status_class)]);

            let attempted_ids: Vec<&str> = attempted.iter().map(String::as_str).collect();
            let retry = outcome.is_retryable()
                && self.policy.allows_another(attempt)
                && DestinationSelector::has_alternative(cluster, &self.health, &attempted_ids);

            match result {
                Ok(response) if !retry => {
                    tracing::debug!(
                        cluster = %cluster.id,
                        destination = %destination.address,
                        attempt,
                        status = response.status.as_u16(),
                        "delivering upstream response"
                    );

                    return Ok(Delivery {
                        response,
                        destination: destination.id.clone(),
                        attempts: attempt,
                    });
                }
                Err(source) if !retry => {
                    tracing::warn!(
                        cluster = %cluster.id,
                        destination = %destination.address,
                        attempt,
                        error = %source,
                        "upstream unreachable and no alternative remains"
                    );

                    return Err(ProxyError::Transport {
                        destination: destination.id.clone(),
                        source,
                    });
                }
                Ok(response) => {
                    tracing::warn!(
                        cluster = %cluster.id,
                        destination = %destination.address,
                        attempt,
                        status = response.status.as_u16(),
                        "retryable upstream status, trying another destination"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        cluster = %cluster.id,
                        destination = %destination.address,
                        attempt,
                        error = %e,
                        "upstream unreachable, trying another destination"
                    );
                }
            }

            self.retries_total.add(1, std::slice::from_ref(&cluster_attr));

            if !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }
    }
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Join the destination address with the inbound path and query
fn upstream_url(address: &Url, path_and_query: &str) -> Result<Url, ProxyError> {
    let base = address.as_str().trim_end_matches('/');
    let url = format!("{base}{path_and_query}");

    Url::parse(&url).map_err(|e| ProxyError::InvalidRequest(format!("cannot build upstream URL: {e}")))
}

fn build_upstream_request(
    destination: &Destination,
    request: &PreparedRequest,
    bearer: &str,
) -> Result<UpstreamRequest, ProxyError> {
    let mut headers = request.headers.clone();
    let authorization = HeaderValue::from_str(bearer).map_err(|_| {
        ProxyError::CredentialUnavailable(AuthError::CredentialUnavailable(
            "token is not a valid header value".to_owned(),
        ))
    })?;
    headers.insert(header::AUTHORIZATION, authorization);

    Ok(UpstreamRequest {
        method: request.method.clone(),
        url: upstream_url(&destination.address, &request.path_and_query)?,
        headers,
        body: request.body.clone(),
    })
}
