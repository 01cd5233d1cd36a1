//! Mock OpenAI-style deployment for integration tests
//!
//! Answers every path from a programmable script of replies and records
//! each request it receives.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

/// A canned reply
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    /// Sent as separate body chunks
    pub chunks: Vec<String>,
    /// Pause between chunks
    pub chunk_delay: Duration,
}

impl Reply {
    /// A JSON reply with the given status and body
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            headers: Vec::new(),
            chunks: vec![body.to_string()],
            chunk_delay: Duration::ZERO,
        }
    }

    /// A `chat.completion` reply with usage
    pub fn completion(content: &str, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self::json(
            200,
            &serde_json::json!({
                "id": "chatcmpl-test",
                "object": "chat.completion",
                "created": 1_700_000_000,
                "model": "gpt-4o-2024-08-06",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": prompt_tokens,
                    "completion_tokens": completion_tokens,
                    "total_tokens": prompt_tokens + completion_tokens
                }
            }),
        )
    }

    /// An OpenAI-style error reply
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(
            status,
            &serde_json::json!({ "error": { "message": message, "type": "upstream", "code": status } }),
        )
    }

    /// A streamed completion whose last data event carries usage
    pub fn event_stream(words: &[&str], prompt_tokens: u64, completion_tokens: u64) -> Self {
        let mut chunks: Vec<String> = words
            .iter()
            .map(|word| {
                let chunk = serde_json::json!({
                    "id": "chatcmpl-test",
                    "object": "chat.completion.chunk",
                    "model": "gpt-4o-2024-08-06",
                    "choices": [{ "index": 0, "delta": { "content": word } }]
                });
                format!("data: {chunk}\n\n")
            })
            .collect();

        let usage = serde_json::json!({
            "id": "chatcmpl-test",
            "object": "chat.completion.chunk",
            "model": "gpt-4o-2024-08-06",
            "choices": [],
            "usage": {
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": prompt_tokens + completion_tokens
            }
        });
        chunks.push(format!("data: {usage}\n\n"));
        chunks.push("data: [DONE]\n\n".to_owned());

        Self {
            status: 200,
            content_type: "text/event-stream",
            headers: Vec::new(),
            chunks,
            chunk_delay: Duration::from_millis(5),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Full body as one string
    pub fn body(&self) -> String {
        self.chunks.concat()
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("captured body is JSON")
    }
}

struct MockState {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    captured: Mutex<Vec<Captured>>,
}

/// Mock deployment server
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Start a mock that always answers with `fallback`
    pub async fn start(fallback: Reply) -> anyhow::Result<Self> {
        Self::scripted(Vec::new(), fallback).await
    }

    /// Start a mock that plays `script` in order, then answers with `fallback`
    pub async fn scripted(script: Vec<Reply>, fallback: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            script: Mutex::new(script.into()),
            fallback,
            captured: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

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

    /// Address to use as a route endpoint
    pub fn address(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.state.captured.lock().unwrap().len()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Captured> {
        self.state.captured.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    state.captured.lock().unwrap().push(Captured {
        method: parts.method.to_string(),
        path_and_query: parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string),
        headers: parts.headers,
        body,
    });

    let reply = state
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.fallback.clone());

    let delay = reply.chunk_delay;
    let chunks = futures_util::stream::iter(reply.chunks).then(move |chunk| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, std::convert::Infallible>(Bytes::from(chunk))
    });

    let mut response = Response::new(Body::from_stream(chunks));
    *response.status_mut() = StatusCode::from_u16(reply.status).expect("valid status");
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, reply.content_type.parse().expect("valid content type"));
    for (name, value) in reply.headers {
        response
            .headers_mut()
            .insert(name, value.parse().expect("valid header value"));
    }

    response
}
