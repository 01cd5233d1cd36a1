use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::{AuthError, AuthToken, TokenSource};

/// Process-wide bearer token for one scope
///
/// Readers share the cached token without locking out each other. When it
/// is missing or expired, exactly one caller refreshes it while the others
/// wait for and reuse the result, a failure included. Dropping a waiting
/// future releases its place in line.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    scope: String,
    refresh_skew: Duration,
    current: RwLock<Option<Arc<AuthToken>>>,
    /// Bumped each time a refresh finishes, successfully or not
    generation: AtomicU64,
    /// Error of the last finished refresh, if it failed
    refresh: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, scope: impl Into<String>, refresh_skew: Duration) -> Self {
        Self {
            source,
            scope: scope.into(),
            refresh_skew,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh: Mutex::new(None),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Return a usable token, fetching one if necessary
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider cannot issue a token
    pub async fn token(&self) -> Result<Arc<AuthToken>, AuthError> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let observed = self.generation.load(Ordering::Acquire);
        let mut last_failure = self.refresh.lock().await;

        // Another caller may have refreshed while this one waited
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        // The refresh this caller queued behind failed; share its outcome
        let shared = (self.generation.load(Ordering::Acquire) != observed)
            .then(|| last_failure.clone())
            .flatten();
        if let Some(message) = shared {
            return Err(AuthError::CredentialUnavailable(message));
        }

        let fetched = self.source.fetch(&self.scope).await;
        self.generation.fetch_add(1, Ordering::AcqRel);

        let token = match fetched {
            Ok(token) => Arc::new(token),
            Err(e) => {
                tracing::error!(scope = %self.scope, error = %e, "failed to acquire bearer token");
                *last_failure = Some(e.to_string());
                return Err(e);
            }
        };

        tracing::debug!(scope = %self.scope, expires_at = %token.expires_at(), "bearer token refreshed");

        *last_failure = None;
        *self.current.write().await = Some(Arc::clone(&token));

        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        self.current.write().await.take();
    }

    /// Release the cached token
    ///
    /// Nothing outlives the process, so teardown only clears memory.
    pub async fn shutdown(&self) {
        self.invalidate().await;
    }

    async fn cached(&self) -> Option<Arc<AuthToken>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| !token.is_expired(self.refresh_skew))
            .map(Arc::clone)
    }
}
