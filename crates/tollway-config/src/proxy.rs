use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::routes::RouteConfig;

/// Default scope requested for upstream bearer tokens
pub const DEFAULT_UPSTREAM_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Proxy pipeline configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// First path segment of every route (`/<namespace>/deployments/<name>/...`)
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Path to a JSON route document
    #[serde(default)]
    pub routes_file: Option<PathBuf>,
    /// Route document given inline as JSON text
    #[serde(default)]
    pub routes_json: Option<String>,
    /// Routes declared directly in TOML
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Scope requested from the identity provider for upstream calls
    #[serde(default = "default_token_scope")]
    pub token_scope: String,
    /// Budget for the whole attempt loop of one request
    #[serde(default = "default_request_timeout", with = "crate::duration")]
    pub request_timeout: Duration,
    /// TCP connect timeout for upstream connections
    #[serde(default = "default_connect_timeout", with = "crate::duration")]
    pub connect_timeout: Duration,
    /// Optional ceiling on attempts per request
    ///
    /// The loop never re-attempts a destination, so it is always bounded
    /// by the cluster size as well.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Fixed delay before each retry
    #[serde(default, with = "crate::duration")]
    pub retry_backoff: Duration,
    /// Passive health policy
    #[serde(default)]
    pub health: HealthPolicyConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            routes_file: None,
            routes_json: None,
            routes: Vec::new(),
            token_scope: default_token_scope(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            max_attempts: None,
            retry_backoff: Duration::ZERO,
            health: HealthPolicyConfig::default(),
        }
    }
}

/// Thresholds for passive destination health
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthPolicyConfig {
    /// Consecutive retryable failures that demote a destination to unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Failures older than this no longer count toward the threshold
    #[serde(default = "default_failure_window", with = "crate::duration")]
    pub failure_window: Duration,
    /// How long a demoted destination stays unhealthy
    #[serde(default = "default_cooldown", with = "crate::duration")]
    pub cooldown: Duration,
    /// Use the upstream's `Retry-After` hint as the cool-down when present
    #[serde(default = "default_true")]
    pub honor_retry_after: bool,
}

impl Default for HealthPolicyConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window: default_failure_window(),
            cooldown: default_cooldown(),
            honor_retry_after: true,
        }
    }
}

fn default_namespace() -> String {
    "openai".to_owned()
}

fn default_token_scope() -> String {
    DEFAULT_UPSTREAM_SCOPE.to_owned()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_failure_threshold() -> u32 {
    1
}

const fn default_failure_window() -> Duration {
    Duration::from_secs(60)
}

const fn default_cooldown() -> Duration {
    Duration::from_secs(10)
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}
