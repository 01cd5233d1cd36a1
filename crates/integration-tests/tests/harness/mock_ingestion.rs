//! Mock Logs Ingestion endpoint capturing posted usage records

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct IngestionState {
    records: Mutex<Vec<serde_json::Value>>,
    authorizations: Mutex<Vec<String>>,
}

/// Mock data collection endpoint
pub struct MockIngestion {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<IngestionState>,
}

impl MockIngestion {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(IngestionState::default());

        let app = Router::new()
            .route(
                "/dataCollectionRules/{rule}/streams/{stream}",
                routing::post(handle_upload),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Data collection endpoint URL
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Records received so far
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.state.records.lock().unwrap().clone()
    }

    /// `Authorization` headers of every upload
    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().unwrap().clone()
    }

    /// Wait until at least `count` records arrived, returning them
    pub async fn wait_for(&self, count: usize) -> Vec<serde_json::Value> {
        for _ in 0..200 {
            let records = self.records();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("expected {count} usage records, got {}", self.records().len());
    }
}

impl Drop for MockIngestion {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_upload(
    State(state): State<Arc<IngestionState>>,
    Path((rule, stream)): Path<(String, String)>,
    Query(query): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
    Json(records): Json<Vec<serde_json::Value>>,
) -> StatusCode {
    if rule != "dcr-test"
        || stream != "Custom-Chargeback_CL"
        || query.get("api-version").map(String::as_str) != Some("2023-01-01")
    {
        return StatusCode::NOT_FOUND;
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.authorizations.lock().unwrap().push(auth.to_owned());
    }
    state.records.lock().unwrap().extend(records);

    StatusCode::NO_CONTENT
}
