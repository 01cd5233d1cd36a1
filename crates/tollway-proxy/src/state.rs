use std::sync::Arc;

use tollway_auth::TokenCache;
use tollway_chargeback::ChargebackEmitter;
use tollway_config::Config;
use tollway_routing::{ClusterSet, HealthPolicy, HealthTracker};

use crate::forward::{Forwarder, ReqwestForwarder};
use crate::retry::{RetryController, RetryPolicy};

/// Shared state for the proxy handler
#[derive(Clone)]
pub struct ProxyState {
    pub(crate) inner: Arc<ProxyStateInner>,
}

pub(crate) struct ProxyStateInner {
    pub(crate) clusters: ClusterSet,
    pub(crate) retry: RetryController,
    pub(crate) tokens: Arc<TokenCache>,
    pub(crate) emitter: ChargebackEmitter,
}

impl ProxyState {
    /// Assemble the proxy from its collaborators
    pub fn new(
        clusters: ClusterSet,
        tokens: Arc<TokenCache>,
        forwarder: Arc<dyn Forwarder>,
        health: Arc<HealthTracker>,
        policy: RetryPolicy,
        emitter: ChargebackEmitter,
    ) -> Self {
        let retry = RetryController::new(health, Arc::clone(&tokens), forwarder, policy);

        Self {
            inner: Arc::new(ProxyStateInner {
                clusters,
                retry,
                tokens,
                emitter,
            }),
        }
    }

    /// Build the proxy from configuration
    ///
    /// Must be called within a Tokio runtime; the charge-back delivery task
    /// is spawned here.
    ///
    /// # Errors
    ///
    /// Returns an error if the routes are unusable or an HTTP client,
    /// identity source or sink cannot be built
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let document = config.route_document()?;
        let clusters = ClusterSet::from_document(&document)?;

        for cluster in clusters.iter() {
            tracing::info!(
                cluster = %cluster.id,
                destinations = cluster.destinations.len(),
                "route loaded"
            );
        }

        let source = tollway_auth::source_from_config(&config.identity)?;
        let tokens = Arc::new(TokenCache::new(
            source,
            config.proxy.token_scope.clone(),
            config.identity.refresh_skew(),
        ));

        let forwarder: Arc<dyn Forwarder> = Arc::new(ReqwestForwarder::new(config.proxy.connect_timeout)?);
        let health = Arc::new(HealthTracker::new(HealthPolicy::from(&config.proxy.health)));

        let sink = tollway_chargeback::sink_from_config(&config.chargeback, &config.identity)?;
        tracing::info!(sink = sink.name(), "chargeback sink configured");

        Ok(Self::new(
            clusters,
            tokens,
            forwarder,
            health,
            RetryPolicy::from(&config.proxy),
            ChargebackEmitter::new(sink),
        ))
    }

    pub fn clusters(&self) -> &ClusterSet {
        &self.inner.clusters
    }

    pub fn health(&self) -> &HealthTracker {
        self.inner.retry.health()
    }

    /// Release cached credentials
    pub async fn shutdown(&self) {
        self.inner.tokens.shutdown().await;
    }
}

impl std::fmt::Debug for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyState")
            .field("clusters", &self.inner.clusters.len())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}
