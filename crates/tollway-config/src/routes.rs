//! Route document: `{ routes: [ { name, endpoints: [ { address, priority } ] } ] }`
//!
//! Keys are accepted in either camel or Pascal case, matching documents
//! produced for the previous generation of this proxy.

use std::path::Path;

use serde::Deserialize;

/// Parsed route document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteDocument {
    #[serde(default, alias = "Routes")]
    pub routes: Vec<RouteConfig>,
}

/// One route; becomes one cluster whose id is the route name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteConfig {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Endpoints")]
    pub endpoints: Vec<EndpointConfig>,
}

/// One backend endpoint of a route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    #[serde(default, alias = "Address")]
    pub address: Option<String>,
    /// Lower is more preferred
    #[serde(default, alias = "Priority")]
    pub priority: i32,
}

impl RouteDocument {
    /// Parse a route document from JSON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty or not a valid route document
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            anyhow::bail!("route document is empty");
        }

        serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse route document: {e}"))
    }

    /// Read and parse a route document from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read route document {}: {e}", path.display()))?;
        Self::from_json(&raw)
    }
}
