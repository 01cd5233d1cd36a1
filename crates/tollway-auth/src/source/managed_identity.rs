use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tollway_config::ManagedIdentityConfig;
use url::Url;

use super::read_token_response;
use crate::{AuthError, AuthToken, TokenSource};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Where managed identity tokens come from
enum Endpoint {
    /// Instance metadata service on virtual machines and AKS
    Imds(Url),
    /// App Service and Container Apps local identity endpoint
    AppService { url: Url, header: SecretString },
}

/// Platform managed identity
pub struct ManagedIdentitySource {
    http: reqwest::Client,
    endpoint: Endpoint,
    client_id: Option<String>,
}

impl ManagedIdentitySource {
    /// Detect the managed identity endpoint
    ///
    /// An explicit endpoint in the configuration is treated as IMDS-style.
    /// Otherwise `IDENTITY_ENDPOINT` and `IDENTITY_HEADER` select the App
    /// Service flow, falling back to IMDS.
    ///
    /// # Errors
    ///
    /// Returns an error if `IDENTITY_ENDPOINT` is not a valid URL
    pub fn from_config(config: &ManagedIdentityConfig, http: reqwest::Client) -> anyhow::Result<Self> {
        let endpoint = if let Some(ref url) = config.endpoint {
            Endpoint::Imds(url.clone())
        } else if let (Ok(url), Ok(header)) =
            (std::env::var("IDENTITY_ENDPOINT"), std::env::var("IDENTITY_HEADER"))
        {
            let url = Url::parse(&url).map_err(|e| anyhow::anyhow!("invalid IDENTITY_ENDPOINT '{url}': {e}"))?;
            Endpoint::AppService {
                url,
                header: SecretString::from(header),
            }
        } else {
            Endpoint::Imds(Url::parse(IMDS_ENDPOINT)?)
        };

        Ok(Self {
            http,
            endpoint,
            client_id: config.client_id.clone(),
        })
    }

    fn request(&self, scope: &str) -> reqwest::RequestBuilder {
        // Managed identity endpoints take a resource, not a v2 scope
        let resource = scope.strip_suffix("/.default").unwrap_or(scope);

        let (url, api_version) = match self.endpoint {
            Endpoint::Imds(ref url) => (url, IMDS_API_VERSION),
            Endpoint::AppService { ref url, .. } => (url, APP_SERVICE_API_VERSION),
        };

        let mut url = url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", api_version);
            query.append_pair("resource", resource);
            if let Some(ref client_id) = self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        let request = self.http.get(url);

        match self.endpoint {
            Endpoint::Imds(_) => request.header("Metadata", "true"),
            Endpoint::AppService { ref header, .. } => request.header("X-IDENTITY-HEADER", header.expose_secret()),
        }
    }
}

#[async_trait]
impl TokenSource for ManagedIdentitySource {
    async fn fetch(&self, scope: &str) -> Result<AuthToken, AuthError> {
        tracing::debug!(scope, "requesting managed identity token");

        let response = self.request(scope).send().await.map_err(|e| {
            AuthError::CredentialUnavailable(format!("managed identity endpoint unreachable: {e}"))
        })?;

        read_token_response(response).await
    }
}
