//! Axum routes for the proxied deployments

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::Response;
use axum::{Router, routing};
use http::header;
use serde::Deserialize;
use tollway_core::{UsageRecord, consumer_from_headers};
use tollway_routing::is_retryable;

use crate::error::ProxyError;
use crate::forward::UpstreamResponse;
use crate::headers::{downstream_headers, upstream_headers};
use crate::meter::{Meter, MeteredBody};
use crate::retry::PreparedRequest;
use crate::rewrite;
use crate::state::ProxyState;

/// Build the router serving `/<namespace>/deployments/<name>/**`
///
/// The bare deployment path, without a tail, is proxied too.
pub fn proxy_router(state: ProxyState, namespace: &str) -> Router {
    let deployment = format!("/{namespace}/deployments/{{deployment}}");

    Router::new()
        .route(&deployment, routing::any(proxy_request))
        .route(&format!("{deployment}/{{*rest}}"), routing::any(proxy_request))
        .with_state(state)
}

#[derive(Deserialize)]
struct DeploymentPath {
    deployment: String,
}

/// Forward one inbound request to its cluster
async fn proxy_request(
    State(state): State<ProxyState>,
    Path(DeploymentPath { deployment }): Path<DeploymentPath>,
    request: Request,
) -> Result<Response, ProxyError> {
    let cluster = state
        .inner
        .clusters
        .get(&deployment)
        .ok_or(ProxyError::UnknownDeployment { deployment })?;

    let (parts, body) = request.into_parts();
    let consumer = consumer_from_headers(&parts.headers);

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::InvalidRequest(format!("failed to read request body: {e}")))?;
    let body = rewrite::force_usage(&body).unwrap_or(body);

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);

    let prepared = PreparedRequest {
        method: parts.method,
        path_and_query,
        headers: upstream_headers(&parts.headers),
        body,
    };

    let delivery = state.inner.retry.execute(&cluster, &prepared).await?;

    tracing::info!(
        cluster = %cluster.id,
        destination = %delivery.destination,
        attempts = delivery.attempts,
        status = delivery.response.status.as_u16(),
        consumer = %consumer,
        "request proxied"
    );

    let UpstreamResponse { status, headers, body } = delivery.response;

    // Retries were exhausted; the error is relayed as is and not metered
    let body = if is_retryable(status) {
        Body::from_stream(body)
    } else {
        let meter = Meter {
            record: UsageRecord::new(consumer),
            cluster: cluster.id.clone(),
            content_type: headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned),
            emitter: state.inner.emitter.clone(),
        };
        Body::from_stream(MeteredBody::new(body, meter))
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = downstream_headers(&headers);

    Ok(response)
}
