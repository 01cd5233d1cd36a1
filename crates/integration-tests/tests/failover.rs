mod harness;

use harness::config::{ConfigBuilder, UPSTREAM_TOKEN};
use harness::mock_upstream::{MockUpstream, Reply};
use harness::server::TestServer;

fn chat_body() -> serde_json::Value {
    serde_json::json!({ "messages": [{ "role": "user", "content": "Hello" }] })
}

async fn post_chat(server: &TestServer, deployment: &str) -> reqwest::Response {
    server
        .client()
        .post(server.deployment_url(deployment, "chat/completions"))
        .json(&chat_body())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn preferred_destination_handles_request() {
    let primary = MockUpstream::start(Reply::completion("primary", 1, 1)).await.unwrap();
    let backup = MockUpstream::start(Reply::completion("backup", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[(&backup.address(), 5), (&primary.address(), 0)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    for _ in 0..5 {
        let resp = post_chat(&server, "gpt-4o").await;
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(primary.request_count(), 5);
    assert_eq!(backup.request_count(), 0);
}

#[tokio::test]
async fn throttled_primary_fails_over_to_backup() {
    let primary = MockUpstream::scripted(vec![Reply::error(429, "throttled")], Reply::completion("primary", 1, 1))
        .await
        .unwrap();
    let backup = MockUpstream::start(Reply::completion("backup", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[(&primary.address(), 0), (&backup.address(), 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "backup");

    assert_eq!(primary.request_count(), 1);
    assert_eq!(backup.request_count(), 1);

    // Both attempts carried the same request body
    assert_eq!(primary.requests()[0].body, backup.requests()[0].body);
}

#[tokio::test]
async fn single_destination_error_is_relayed_verbatim() {
    let reply = Reply::error(500, "internal failure");
    let expected = reply.body();
    let only = MockUpstream::start(reply).await.unwrap();

    let config = ConfigBuilder::new().with_route("gpt-4o", &[(&only.address(), 0)]).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.unwrap(), expected);
    assert_eq!(only.request_count(), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let primary = MockUpstream::start(Reply::error(400, "bad request")).await.unwrap();
    let backup = MockUpstream::start(Reply::completion("backup", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[(&primary.address(), 0), (&backup.address(), 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 400);
    assert_eq!(backup.request_count(), 0);
}

#[tokio::test]
async fn exhausted_cluster_relays_last_response() {
    let first = MockUpstream::start(Reply::error(503, "first down")).await.unwrap();
    let last_reply = Reply::error(502, "last down");
    let expected = last_reply.body();
    let last = MockUpstream::start(last_reply).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[(&first.address(), 0), (&last.address(), 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 502);
    assert_eq!(resp.text().await.unwrap(), expected);
    assert_eq!(first.request_count(), 1);
    assert_eq!(last.request_count(), 1);
}

#[tokio::test]
async fn max_attempts_limits_failover() {
    let first = MockUpstream::start(Reply::error(503, "first down")).await.unwrap();
    let second = MockUpstream::start(Reply::completion("second", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[(&first.address(), 0), (&second.address(), 1)])
        .with_max_attempts(1)
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 503);
    assert_eq!(second.request_count(), 0);
}

#[tokio::test]
async fn unreachable_destination_fails_over() {
    let backup = MockUpstream::start(Reply::completion("backup", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[("http://127.0.0.1:9/", 0), (&backup.address(), 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(backup.request_count(), 1);
}

#[tokio::test]
async fn unreachable_cluster_is_bad_gateway() {
    let config = ConfigBuilder::new()
        .with_route("gpt-4o", &[("http://127.0.0.1:9/", 0)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-4o").await;
    assert_eq!(resp.status(), 502);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "upstream_error");
}

#[tokio::test]
async fn unknown_deployment_is_not_found() {
    let only = MockUpstream::start(Reply::completion("hi", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new().with_route("gpt-4o", &[(&only.address(), 0)]).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = post_chat(&server, "gpt-5").await;
    assert_eq!(resp.status(), 404);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "not_found_error");
    assert_eq!(only.request_count(), 0);
}

#[tokio::test]
async fn caller_credentials_are_replaced_with_bearer_token() {
    let only = MockUpstream::start(Reply::completion("hi", 1, 1)).await.unwrap();

    let config = ConfigBuilder::new().with_route("gpt-4o", &[(&only.address(), 0)]).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.deployment_url("gpt-4o", "chat/completions"))
        .header("api-key", "caller-key")
        .header("authorization", "Bearer caller-token")
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let captured = &only.requests()[0];
    assert!(captured.headers.get("api-key").is_none());
    assert_eq!(
        captured.headers["authorization"].to_str().unwrap(),
        format!("Bearer {UPSTREAM_TOKEN}")
    );
    assert_eq!(
        captured.path_and_query,
        "/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
    );
    assert_eq!(captured.method, "POST");
}

#[tokio::test]
async fn routes_from_json_document() {
    let only = MockUpstream::start(Reply::completion("hi", 1, 1)).await.unwrap();

    let routes = serde_json::json!({
        "Routes": [
            { "Name": "text-embedding-3-small", "Endpoints": [{ "Address": only.address(), "Priority": 0 }] }
        ]
    });

    let config = ConfigBuilder::new().with_routes_json(&routes.to_string()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.deployment_url("text-embedding-3-small", "embeddings"))
        .json(&serde_json::json!({ "input": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(only.request_count(), 1);
}
