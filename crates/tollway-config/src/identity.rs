use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Credential used to obtain bearer tokens for upstream calls
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityConfig {
    /// Platform managed identity (IMDS, App Service, Container Apps)
    ManagedIdentity(ManagedIdentityConfig),
    /// OAuth2 client-credentials grant
    ClientSecret(ClientSecretConfig),
    /// Fixed token, for development and tests
    Static(StaticTokenConfig),
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self::ManagedIdentity(ManagedIdentityConfig::default())
    }
}

impl IdentityConfig {
    /// How long before expiry a token is refreshed
    pub const fn refresh_skew(&self) -> Duration {
        match self {
            Self::ManagedIdentity(c) => c.refresh_skew,
            Self::ClientSecret(c) => c.refresh_skew,
            Self::Static(_) => Duration::ZERO,
        }
    }
}

/// Managed identity settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagedIdentityConfig {
    /// Client id of a user-assigned identity
    #[serde(default)]
    pub client_id: Option<String>,
    /// Override the token endpoint (IMDS by default)
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default, with = "crate::duration")]
    pub refresh_skew: Duration,
}

/// Client-credentials settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSecretConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Identity provider base URL
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default, with = "crate::duration")]
    pub refresh_skew: Duration,
}

/// Static token settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticTokenConfig {
    pub token: SecretString,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_owned()
}
