use std::collections::HashMap;
use std::sync::Arc;

use tollway_config::{RouteConfig, RouteDocument};
use url::Url;

/// One backend endpoint of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Stable identity, the configured address
    pub id: String,
    pub address: Url,
    /// Lower is more preferred
    pub priority: i32,
}

/// Named group of interchangeable destinations
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub destinations: Vec<Destination>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, destinations: Vec<Destination>) -> Self {
        Self {
            id: id.into(),
            destinations,
        }
    }

    /// Build a cluster from one route entry
    ///
    /// Returns `None` when the route has no name or no usable endpoint.
    fn from_route(route: &RouteConfig) -> Option<Self> {
        let name = route.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let Some(name) = name else {
            tracing::warn!("skipping route without a name");
            return None;
        };

        let mut destinations: Vec<Destination> = Vec::with_capacity(route.endpoints.len());

        for endpoint in &route.endpoints {
            let Some(raw) = endpoint.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
                tracing::warn!(cluster = name, "skipping endpoint without an address");
                continue;
            };

            let address = match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => url,
                _ => {
                    tracing::warn!(cluster = name, address = raw, "skipping endpoint with an invalid address");
                    continue;
                }
            };

            let destination = Destination {
                id: raw.to_owned(),
                address,
                priority: endpoint.priority,
            };

            // Destinations are keyed by address; a repeated address replaces the earlier entry
            match destinations.iter_mut().find(|d| d.id == destination.id) {
                Some(existing) => *existing = destination,
                None => destinations.push(destination),
            }
        }

        if destinations.is_empty() {
            tracing::warn!(cluster = name, "skipping route without usable endpoints");
            return None;
        }

        Some(Self::new(name, destinations))
    }

    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }
}

/// Every cluster known to the proxy, keyed by route name
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    clusters: HashMap<String, Arc<Cluster>>,
}

impl ClusterSet {
    /// Build the cluster set from a route document
    ///
    /// # Errors
    ///
    /// Returns an error if no route survives validation
    pub fn from_document(document: &RouteDocument) -> anyhow::Result<Self> {
        let mut clusters = HashMap::new();

        for cluster in document.routes.iter().filter_map(Cluster::from_route) {
            if clusters.contains_key(&cluster.id) {
                tracing::warn!(cluster = %cluster.id, "duplicate route name, later definition wins");
            }
            clusters.insert(cluster.id.clone(), Arc::new(cluster));
        }

        if clusters.is_empty() {
            anyhow::bail!("route document contains no usable routes");
        }

        tracing::info!(clusters = clusters.len(), "loaded route clusters");

        Ok(Self { clusters })
    }

    pub fn get(&self, id: &str) -> Option<Arc<Cluster>> {
        self.clusters.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cluster>> {
        self.clusters.values()
    }
}

impl FromIterator<Cluster> for ClusterSet {
    fn from_iter<T: IntoIterator<Item = Cluster>>(iter: T) -> Self {
        Self {
            clusters: iter.into_iter().map(|c| (c.id.clone(), Arc::new(c))).collect(),
        }
    }
}
