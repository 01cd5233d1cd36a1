//! Metric names and instrument helpers
//!
//! Instruments come from the global meter provider, so they are no-ops
//! until an exporter is configured.

use opentelemetry::global;
use opentelemetry::metrics::Counter;

/// Instrumentation scope for every tollway instrument
pub const METER_NAME: &str = "tollway";

/// Upstream attempts, by cluster and status class
pub const UPSTREAM_ATTEMPTS: &str = "tollway.upstream.attempts";
/// Attempts that were followed by another attempt
pub const UPSTREAM_RETRIES: &str = "tollway.upstream.retries";
/// Metered tokens, by cluster, model and direction
pub const TOKENS: &str = "tollway.tokens";
/// Usage records that never reached the sink
pub const CHARGEBACK_DROPPED: &str = "tollway.chargeback.dropped";
/// Selections made while every destination was unhealthy
pub const CLUSTER_DEGRADED: &str = "tollway.cluster.degraded";

/// Build a `u64` counter on the tollway meter
pub fn counter(name: &'static str, description: &'static str) -> Counter<u64> {
    global::meter(METER_NAME)
        .u64_counter(name)
        .with_description(description)
        .build()
}

/// Status class attribute value (`2xx`, `4xx`, ...)
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}
