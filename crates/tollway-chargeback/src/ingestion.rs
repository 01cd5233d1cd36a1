use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tollway_auth::TokenCache;
use tollway_config::LogIngestionConfig;
use tollway_core::UsageRecord;
use url::Url;

use crate::circuit::CircuitBreaker;
use crate::error::ChargebackError;
use crate::sink::TelemetrySink;

/// Azure Monitor Logs Ingestion API
///
/// POST `<endpoint>/dataCollectionRules/<rule_id>/streams/<stream>` with a
/// JSON array of records.
pub struct LogIngestionSink {
    http: reqwest::Client,
    url: Url,
    tokens: Arc<TokenCache>,
    circuit: CircuitBreaker,
}

impl LogIngestionSink {
    /// Create a sink for one data collection rule stream
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &LogIngestionConfig, tokens: Arc<TokenCache>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build chargeback HTTP client: {e}"))?;

        Ok(Self {
            http,
            url: ingestion_url(config),
            tokens,
            circuit: CircuitBreaker::new(),
        })
    }

    async fn upload(&self, record: &UsageRecord) -> Result<(), ChargebackError> {
        let token = self.tokens.token().await?;

        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(token.secret().expose_secret())
            .json(&[record])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(ChargebackError::Api { status, message })
        }
    }
}

fn ingestion_url(config: &LogIngestionConfig) -> Url {
    let mut url = config.endpoint.clone();

    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["dataCollectionRules", config.rule_id.as_str(), "streams", config.stream.as_str()]);
    }

    url.query_pairs_mut().append_pair("api-version", &config.api_version);
    url
}

#[async_trait]
impl TelemetrySink for LogIngestionSink {
    async fn emit(&self, record: &UsageRecord) -> Result<(), ChargebackError> {
        self.circuit.check()?;

        match self.upload(record).await {
            Ok(()) => {
                self.circuit.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit.record_failure();
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_ingestion"
    }
}

#[cfg(test)]
mod tests {
    use tollway_auth::source::StaticSource;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(endpoint: &str) -> LogIngestionConfig {
        LogIngestionConfig {
            endpoint: Url::parse(endpoint).unwrap(),
            rule_id: "dcr-0123".to_owned(),
            stream: "Custom-Chargeback_CL".to_owned(),
            scope: tollway_config::DEFAULT_INGESTION_SCOPE.to_owned(),
            api_version: "2023-01-01".to_owned(),
            timeout: std::time::Duration::from_secs(5),
        }
    }

    fn sink(endpoint: &str) -> LogIngestionSink {
        let source = Arc::new(StaticSource::new("monitor-token".into()));
        let tokens = Arc::new(TokenCache::new(source, "scope", std::time::Duration::ZERO));
        LogIngestionSink::new(&config(endpoint), tokens).unwrap()
    }

    fn record() -> UsageRecord {
        let mut record = UsageRecord::new("team-a");
        record.model = Some("gpt-4o".to_owned());
        record.object_type = Some("chat.completion".to_owned());
        record.input_tokens = 10;
        record.output_tokens = 5;
        record.finalize();
        record
    }

    #[test]
    fn url_includes_rule_stream_and_version() {
        let url = ingestion_url(&config("https://dce.example.com/"));
        assert_eq!(
            url.as_str(),
            "https://dce.example.com/dataCollectionRules/dcr-0123/streams/Custom-Chargeback_CL?api-version=2023-01-01"
        );
    }

    #[tokio::test]
    async fn uploads_record_as_json_array() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/dataCollectionRules/dcr-0123/streams/Custom-Chargeback_CL"))
            .and(query_param("api-version", "2023-01-01"))
            .and(header("authorization", "Bearer monitor-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server.uri()).emit(&record()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let rows = body.as_array().unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Consumer"], "team-a");
        assert_eq!(rows[0]["Model"], "gpt-4o");
        assert_eq!(rows[0]["TotalTokens"], 15);
    }

    #[tokio::test]
    async fn repeated_failures_open_the_circuit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let sink = sink(&server.uri());

        for _ in 0..3 {
            let err = sink.emit(&record()).await.unwrap_err();
            assert!(matches!(err, ChargebackError::Api { status: 503, .. }));
        }

        let err = sink.emit(&record()).await.unwrap_err();
        assert!(matches!(err, ChargebackError::CircuitOpen));
    }
}
