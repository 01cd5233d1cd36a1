use async_trait::async_trait;
use jiff::Timestamp;
use secrecy::{ExposeSecret, SecretString};
use tollway_config::StaticTokenConfig;

use crate::token::jwt_expiry;
use crate::{AuthError, AuthToken, TokenSource};

/// Fixed token
///
/// A JWT expires at its `exp` claim; anything else never expires.
pub struct StaticSource {
    token: SecretString,
}

impl StaticSource {
    pub const fn new(token: SecretString) -> Self {
        Self { token }
    }

    pub fn from_config(config: &StaticTokenConfig) -> Self {
        Self::new(SecretString::from(config.token.expose_secret()))
    }
}

#[async_trait]
impl TokenSource for StaticSource {
    async fn fetch(&self, _scope: &str) -> Result<AuthToken, AuthError> {
        let raw = self.token.expose_secret();
        let expires_at = jwt_expiry(raw).unwrap_or(Timestamp::MAX);
        Ok(AuthToken::new(SecretString::from(raw), expires_at))
    }
}
