//! Clusters, passive destination health and destination selection

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod cluster;
pub mod error;
pub mod health;
pub mod selector;

pub use cluster::{Cluster, ClusterSet, Destination};
pub use error::RoutingError;
pub use health::{
    HealthEntry, HealthPolicy, HealthState, HealthTracker, Outcome, is_retryable, next_state, retry_after_hint,
};
pub use selector::{DestinationSelector, Selection};
