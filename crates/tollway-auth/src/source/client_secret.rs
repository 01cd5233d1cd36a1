use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tollway_config::ClientSecretConfig;
use url::Url;

use super::read_token_response;
use crate::{AuthError, AuthToken, TokenSource};

/// OAuth2 client-credentials grant
pub struct ClientSecretSource {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
}

impl ClientSecretSource {
    /// Create a source for `<authority>/<tenant>/oauth2/v2.0/token`
    ///
    /// # Errors
    ///
    /// Returns an error if the authority and tenant do not form a valid URL
    pub fn from_config(config: &ClientSecretConfig, http: reqwest::Client) -> anyhow::Result<Self> {
        let authority = config.authority.trim_end_matches('/');
        let token_url = Url::parse(&format!("{authority}/{}/oauth2/v2.0/token", config.tenant_id))
            .map_err(|e| anyhow::anyhow!("invalid identity authority '{authority}': {e}"))?;

        Ok(Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.expose_secret()),
        })
    }
}

#[async_trait]
impl TokenSource for ClientSecretSource {
    async fn fetch(&self, scope: &str) -> Result<AuthToken, AuthError> {
        tracing::debug!(client_id = %self.client_id, scope, "requesting client credentials token");

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("scope", scope),
            ])
            .send()
            .await?;

        read_token_response(response).await
    }
}
