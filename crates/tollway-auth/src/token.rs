use std::fmt;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use jwt_compact::UntrustedToken;
use secrecy::{ExposeSecret, SecretString};

/// Bearer token and the instant it stops being usable
///
/// Never mutated; a refresh replaces the whole value.
pub struct AuthToken {
    secret: SecretString,
    expires_at: Timestamp,
}

impl AuthToken {
    pub const fn new(secret: SecretString, expires_at: Timestamp) -> Self {
        Self { secret, expires_at }
    }

    /// Build a token from an identity provider response
    ///
    /// The JWT `exp` claim wins; otherwise `expires_on` (unix seconds) then
    /// `expires_in` (seconds from now). A token with none of these is
    /// already expired.
    pub fn from_provider(raw: String, expires_in: Option<i64>, expires_on: Option<i64>) -> Self {
        let expires_at = jwt_expiry(&raw)
            .or_else(|| expires_on.and_then(|secs| Timestamp::from_second(secs).ok()))
            .or_else(|| expires_in.and_then(|secs| Timestamp::now().checked_add(SignedDuration::from_secs(secs)).ok()))
            .unwrap_or(Timestamp::UNIX_EPOCH);

        Self::new(SecretString::from(raw), expires_at)
    }

    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub const fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret.expose_secret())
    }

    /// Whether the token is expired at `now`, counting `skew` as already elapsed
    pub fn is_expired_at(&self, now: Timestamp, skew: Duration) -> bool {
        let skew = SignedDuration::try_from(skew).unwrap_or(SignedDuration::MAX);
        let deadline = now.checked_add(skew).unwrap_or(Timestamp::MAX);
        self.expires_at <= deadline
    }

    pub fn is_expired(&self, skew: Duration) -> bool {
        self.is_expired_at(Timestamp::now(), skew)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Read the `exp` claim of a JWT without verifying its signature
///
/// Unreadable tokens yield `None`.
pub fn jwt_expiry(raw: &str) -> Option<Timestamp> {
    let token = UntrustedToken::new(raw).ok()?;
    let claims = token.deserialize_claims_unchecked::<jwt_compact::Empty>().ok()?;
    let expiration = claims.expiration?;
    Timestamp::from_second(expiration.timestamp()).ok()
}
