//! Bearer tokens for upstream calls
//!
//! A [`TokenSource`] talks to an identity provider; a [`TokenCache`] keeps
//! the current token and collapses concurrent refreshes into one fetch.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod cache;
mod error;
pub mod source;
mod token;

use std::sync::Arc;
use std::time::Duration;

use tollway_config::IdentityConfig;

pub use cache::TokenCache;
pub use error::AuthError;
pub use source::TokenSource;
pub use token::AuthToken;

/// Build the token source described by the identity configuration
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the managed
/// identity environment is inconsistent
pub fn source_from_config(config: &IdentityConfig) -> anyhow::Result<Arc<dyn TokenSource>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build identity HTTP client: {e}"))?;

    let source: Arc<dyn TokenSource> = match config {
        IdentityConfig::ManagedIdentity(managed) => {
            Arc::new(source::ManagedIdentitySource::from_config(managed, http)?)
        }
        IdentityConfig::ClientSecret(client) => Arc::new(source::ClientSecretSource::from_config(client, http)?),
        IdentityConfig::Static(fixed) => Arc::new(source::StaticSource::from_config(fixed)),
    };

    Ok(source)
}
