//! Identity provider clients

mod client_secret;
mod managed_identity;
mod static_token;

use async_trait::async_trait;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

pub use client_secret::ClientSecretSource;
pub use managed_identity::ManagedIdentitySource;
pub use static_token::StaticSource;

use crate::{AuthError, AuthToken};

/// Issues bearer tokens for a scope
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a fresh token from the identity provider
    async fn fetch(&self, scope: &str) -> Result<AuthToken, AuthError>;
}

/// Token endpoint response shared by the OAuth2 and managed identity flows
///
/// Managed identity endpoints report the numeric fields as strings.
#[serde_as]
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    expires_on: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> AuthToken {
        AuthToken::from_provider(self.access_token, self.expires_in, self.expires_on)
    }
}

/// Turn an identity provider HTTP response into a token
async fn read_token_response(response: reqwest::Response) -> Result<AuthToken, AuthError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Provider {
            status: status.as_u16(),
            message,
        });
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::CredentialUnavailable(format!("failed to parse token response: {e}")))?;

    Ok(body.into_token())
}
