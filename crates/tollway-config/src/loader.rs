use std::path::Path;

use crate::{Config, RouteDocument};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails,
    /// or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config: Self = toml::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_proxy()?;
        self.validate_server()?;
        Ok(())
    }

    /// Resolve the route document from the first configured source
    ///
    /// Inline JSON wins over a routes file, which wins over routes declared
    /// in TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected source cannot be read or parsed
    pub fn route_document(&self) -> anyhow::Result<RouteDocument> {
        if let Some(ref raw) = self.proxy.routes_json {
            return RouteDocument::from_json(raw);
        }

        if let Some(ref path) = self.proxy.routes_file {
            return RouteDocument::load(path);
        }

        Ok(RouteDocument {
            routes: self.proxy.routes.clone(),
        })
    }

    fn validate_proxy(&self) -> anyhow::Result<()> {
        let namespace = &self.proxy.namespace;
        if namespace.is_empty()
            || !namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("proxy.namespace must be a non-empty path segment, got '{namespace}'");
        }

        if self.proxy.max_attempts == Some(0) {
            anyhow::bail!("proxy.max_attempts must be greater than 0");
        }

        if self.proxy.health.failure_threshold == 0 {
            anyhow::bail!("proxy.health.failure_threshold must be greater than 0");
        }

        if self.proxy.request_timeout.is_zero() {
            anyhow::bail!("proxy.request_timeout must be greater than 0");
        }

        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        let path = &self.server.health.path;
        if !path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/', got '{path}'");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{ChargebackConfig, IdentityConfig};

    #[test]
    fn load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            listen_address = "127.0.0.1:9000"

            [proxy]
            namespace = "openai"

            [[proxy.routes]]
            name = "gpt-4o"
            endpoints = [
                {{ address = "https://east.example.com/", priority = 1 }},
                {{ address = "https://west.example.com/", priority = 2 }},
            ]

            [identity]
            type = "static"
            token = "dev-token"

            [chargeback]
            type = "log"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.listen_address.unwrap().port(), 9000);
        assert!(matches!(config.identity, IdentityConfig::Static(_)));
        assert!(matches!(config.chargeback, ChargebackConfig::Log));

        let doc = config.route_document().unwrap();
        assert_eq!(doc.routes.len(), 1);
        assert_eq!(doc.routes[0].endpoints.len(), 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = toml::from_str::<Config>("[proxy]\nretries = 3").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn inline_json_wins_over_toml_routes() {
        let config: Config = toml::from_str(
            r#"
            [proxy]
            routes_json = '{"routes":[{"name":"from-json","endpoints":[{"address":"https://a/"}]}]}'

            [[proxy.routes]]
            name = "from-toml"
            "#,
        )
        .unwrap();

        let doc = config.route_document().unwrap();
        assert_eq!(doc.routes[0].name.as_deref(), Some("from-json"));
    }

    #[test]
    fn routes_file_is_read() {
        let mut routes = tempfile::NamedTempFile::new().unwrap();
        write!(
            routes,
            r#"{{"Routes":[{{"Name":"embed","Endpoints":[{{"Address":"https://a/"}}]}}]}}"#
        )
        .unwrap();

        let mut config = Config::default();
        config.proxy.routes_file = Some(routes.path().to_path_buf());

        let doc = config.route_document().unwrap();
        assert_eq!(doc.routes[0].name.as_deref(), Some("embed"));
    }

    #[test]
    fn zero_max_attempts_is_invalid() {
        let mut config = Config::default();
        config.proxy.max_attempts = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn namespace_with_slash_is_invalid() {
        let mut config = Config::default();
        config.proxy.namespace = "open/ai".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn health_path_must_be_absolute() {
        let mut config = Config::default();
        config.server.health.path = "health".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/tollway.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tollway.toml"));
    }
}
