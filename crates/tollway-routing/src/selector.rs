use std::time::Instant;

use rand::Rng;

use crate::cluster::{Cluster, Destination};
use crate::error::RoutingError;
use crate::health::HealthTracker;

/// Result of a selection
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub destination: &'a Destination,
    /// Every candidate was unhealthy and the pick ignored health
    pub degraded: bool,
}

/// Priority- and health-aware destination choice
///
/// Read-only over the health tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationSelector;

impl DestinationSelector {
    /// Pick one destination of `cluster`, skipping ids in `exclude`
    ///
    /// Eligible destinations are those not unhealthy; among them the lowest
    /// priority wins, with ties broken uniformly at random. When nothing is
    /// eligible the cluster is degraded and any candidate may be returned.
    /// If `exclude` covers the whole cluster it is ignored.
    pub fn select<'a>(
        cluster: &'a Cluster,
        health: &HealthTracker,
        exclude: &[&str],
    ) -> Result<Selection<'a>, RoutingError> {
        Self::select_with(cluster, health, exclude, &mut rand::rng())
    }

    pub fn select_with<'a, R: Rng + ?Sized>(
        cluster: &'a Cluster,
        health: &HealthTracker,
        exclude: &[&str],
        rng: &mut R,
    ) -> Result<Selection<'a>, RoutingError> {
        if cluster.destinations.is_empty() {
            return Err(RoutingError::NoDestinationsConfigured {
                cluster: cluster.id.clone(),
            });
        }

        let mut candidates: Vec<&Destination> = cluster
            .destinations
            .iter()
            .filter(|d| !exclude.contains(&d.id.as_str()))
            .collect();

        if candidates.is_empty() {
            candidates = cluster.destinations.iter().collect();
        }

        let now = Instant::now();
        let eligible: Vec<&Destination> = candidates
            .iter()
            .copied()
            .filter(|d| health.state_at(&d.id, now).is_eligible())
            .collect();

        if eligible.is_empty() {
            let destination = candidates[rng.random_range(0..candidates.len())];

            tracing::warn!(
                cluster = %cluster.id,
                destination = %destination.id,
                "all destinations unhealthy, selecting in degraded mode"
            );

            return Ok(Selection {
                destination,
                degraded: true,
            });
        }

        let best = eligible.iter().map(|d| d.priority).min().unwrap_or_default();
        let tied: Vec<&Destination> = eligible.into_iter().filter(|d| d.priority == best).collect();

        let destination = if tied.len() == 1 {
            tied[0]
        } else {
            tied[rng.random_range(0..tied.len())]
        };

        Ok(Selection {
            destination,
            degraded: false,
        })
    }

    /// Whether a destination other than those already attempted is still eligible
    pub fn has_alternative(cluster: &Cluster, health: &HealthTracker, attempted: &[&str]) -> bool {
        let now = Instant::now();
        cluster
            .destinations
            .iter()
            .filter(|d| !attempted.contains(&d.id.as_str()))
            .any(|d| health.state_at(&d.id, now).is_eligible())
    }
}
