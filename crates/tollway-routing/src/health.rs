//! Passive destination health
//!
//! Health is inferred only from outcomes observed on requests sent to a
//! destination. Each destination holds one [`HealthEntry`]; transitions are
//! computed by the pure [`next_state`] function and applied under the map's
//! per-key lock, so a concurrent reader never sees a half-applied update.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::{HeaderMap, StatusCode};
use tollway_config::HealthPolicyConfig;

/// Health of a single destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthState {
    /// Recently served a successful response
    Healthy,
    /// Never observed, or back from a cool-down
    #[default]
    Unknown,
    /// Excluded from selection until the cool-down ends
    Unhealthy,
}

impl HealthState {
    /// Whether the selector may pick a destination in this state
    pub const fn is_eligible(self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Observed result of one attempt against a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx or 3xx
    Success,
    /// 429, 5xx, or no response at all
    RetryableFailure {
        /// Cool-down suggested by the upstream
        retry_after: Option<Duration>,
    },
    /// Any other 4xx
    OtherFailure,
}

impl Outcome {
    /// Classify an upstream response
    pub fn from_response(status: StatusCode, headers: &HeaderMap) -> Self {
        if is_retryable(status) {
            Self::RetryableFailure {
                retry_after: retry_after_hint(headers),
            }
        } else if status.is_client_error() {
            Self::OtherFailure
        } else {
            Self::Success
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RetryableFailure { .. })
    }
}

/// Statuses that make the retry loop try another destination
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

const RETRY_HINT_HEADERS: [&str; 3] = ["retry-after", "x-ratelimit-reset-requests", "x-ratelimit-reset-tokens"];

/// Longest cool-down an upstream hint may impose
pub const MAX_RETRY_HINT: Duration = Duration::from_secs(300);

/// Read the upstream's cool-down hint
///
/// Checks `Retry-After`, then the rate-limit reset headers. Values are
/// seconds; `Retry-After` may also be an HTTP date. Hints are capped at
/// [`MAX_RETRY_HINT`].
pub fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    RETRY_HINT_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?.trim();
        parse_hint(value).map(|hint| hint.min(MAX_RETRY_HINT))
    })
}

fn parse_hint(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = jiff::fmt::rfc2822::parse(value).ok()?.timestamp();
    let remaining = at.duration_since(jiff::Timestamp::now());
    Some(Duration::try_from(remaining).unwrap_or(Duration::ZERO))
}

/// Thresholds driving [`next_state`]
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub cooldown: Duration,
    pub honor_retry_after: bool,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthPolicyConfig::default())
    }
}

impl From<&HealthPolicyConfig> for HealthPolicy {
    fn from(config: &HealthPolicyConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            failure_window: config.failure_window,
            cooldown: config.cooldown,
            honor_retry_after: config.honor_retry_after,
        }
    }
}

/// Health bookkeeping for one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthEntry {
    pub state: HealthState,
    /// Retryable failures since the last success or demotion
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
    /// End of the current cool-down, set while unhealthy
    pub unhealthy_until: Option<Instant>,
}

impl HealthEntry {
    /// State as of `now`, with an elapsed cool-down applied
    pub fn state_at(&self, now: Instant) -> HealthState {
        match (self.state, self.unhealthy_until) {
            (HealthState::Unhealthy, Some(until)) if now >= until => HealthState::Unknown,
            (state, _) => state,
        }
    }

    fn settle(self, now: Instant) -> Self {
        if self.state == HealthState::Unhealthy && self.state_at(now) == HealthState::Unknown {
            Self::default()
        } else {
            self
        }
    }
}

/// Compute the entry that results from observing `outcome` at `now`
pub fn next_state(current: HealthEntry, outcome: Outcome, policy: &HealthPolicy, now: Instant) -> HealthEntry {
    let current = current.settle(now);

    match outcome {
        Outcome::Success => HealthEntry {
            state: HealthState::Healthy,
            ..HealthEntry::default()
        },
        Outcome::OtherFailure => current,
        Outcome::RetryableFailure { retry_after } => {
            let within_window = current
                .last_failure
                .is_some_and(|last| now.saturating_duration_since(last) <= policy.failure_window);

            let consecutive_failures = if within_window {
                current.consecutive_failures.saturating_add(1)
            } else {
                1
            };

            if consecutive_failures < policy.failure_threshold {
                return HealthEntry {
                    consecutive_failures,
                    last_failure: Some(now),
                    ..current
                };
            }

            let cooldown = retry_after
                .filter(|_| policy.honor_retry_after)
                .unwrap_or(policy.cooldown);

            // An already unhealthy destination keeps the later of the two deadlines
            let until = now
                .checked_add(cooldown)
                .or_else(|| now.checked_add(policy.cooldown))
                .unwrap_or(now);
            let unhealthy_until = match current.unhealthy_until {
                Some(existing) if current.state == HealthState::Unhealthy => existing.max(until),
                _ => until,
            };

            HealthEntry {
                state: HealthState::Unhealthy,
                consecutive_failures,
                last_failure: Some(now),
                unhealthy_until: Some(unhealthy_until),
            }
        }
    }
}

/// Process-wide map of destination id to health
pub struct HealthTracker {
    entries: DashMap<String, HealthEntry>,
    policy: HealthPolicy,
}

impl HealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Current state of a destination
    pub fn state(&self, destination: &str) -> HealthState {
        self.state_at(destination, Instant::now())
    }

    pub fn state_at(&self, destination: &str, now: Instant) -> HealthState {
        self.entries
            .get(destination)
            .map_or(HealthState::Unknown, |entry| entry.state_at(now))
    }

    /// Record the outcome of an attempt against a destination
    pub fn observe(&self, destination: &str, outcome: Outcome) {
        self.observe_at(destination, outcome, Instant::now());
    }

    pub fn observe_at(&self, destination: &str, outcome: Outcome, now: Instant) {
        let mut entry = self.entries.entry(destination.to_owned()).or_default();

        let previous = entry.state_at(now);
        let updated = next_state(*entry, outcome, &self.policy, now);
        *entry = updated;
        drop(entry);

        if previous != updated.state {
            match updated.state {
                HealthState::Unhealthy => tracing::warn!(
                    destination,
                    failures = updated.consecutive_failures,
                    cooldown_secs = updated
                        .unhealthy_until
                        .map_or(0.0, |until| until.saturating_duration_since(now).as_secs_f64()),
                    "destination marked unhealthy"
                ),
                state => tracing::debug!(destination, ?state, "destination health changed"),
            }
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
