//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use tollway_config::{
    ChargebackConfig, Config, EndpointConfig, IdentityConfig, LogIngestionConfig, RouteConfig, ServerConfig,
    StaticTokenConfig,
};

/// Token the proxy presents to every mock upstream
pub const UPSTREAM_TOKEN: &str = "test-upstream-token";

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with a static token and the log sink
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                identity: IdentityConfig::Static(StaticTokenConfig {
                    token: SecretString::from(UPSTREAM_TOKEN),
                }),
                ..Config::default()
            },
        }
    }

    /// Add a route whose endpoints are `(address, priority)` pairs
    pub fn with_route(mut self, name: &str, endpoints: &[(&str, i32)]) -> Self {
        self.config.proxy.routes.push(RouteConfig {
            name: Some(name.to_owned()),
            endpoints: endpoints
                .iter()
                .map(|(address, priority)| EndpointConfig {
                    address: Some((*address).to_owned()),
                    priority: *priority,
                })
                .collect(),
        });
        self
    }

    /// Supply the route document as JSON text
    pub fn with_routes_json(mut self, json: &str) -> Self {
        self.config.proxy.routes_json = Some(json.to_owned());
        self
    }

    /// Deliver usage records to a Logs Ingestion endpoint
    pub fn with_ingestion(mut self, endpoint: &str) -> Self {
        self.config.chargeback = ChargebackConfig::LogIngestion(LogIngestionConfig {
            endpoint: endpoint.parse().expect("valid URL"),
            rule_id: "dcr-test".to_owned(),
            stream: "Custom-Chargeback_CL".to_owned(),
            scope: "https://monitor.azure.com/.default".to_owned(),
            api_version: "2023-01-01".to_owned(),
            timeout: Duration::from_secs(5),
        });
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.proxy.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.proxy.health.cooldown = cooldown;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy.request_timeout = timeout;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
