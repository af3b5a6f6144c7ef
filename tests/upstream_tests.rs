//! `HttpUpstream` against a throwaway local server standing in for the upstream.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;

use summary_gateway::config::UpstreamConfig;
use summary_gateway::server::openai_api::ChatMessage;
use summary_gateway::upstream::client::{HttpUpstream, Upstream, UpstreamError};

#[derive(Default)]
struct Seen {
    body: Option<serde_json::Value>,
    headers: Option<HeaderMap>,
}

#[derive(Clone)]
struct Fake {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Seen>>,
}

async fn fake_summary(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let mut seen = fake.seen.lock().unwrap();
    seen.body = Some(body);
    seen.headers = Some(headers);
    (fake.status, fake.body)
}

/// Start a fake upstream and return its URL plus what it saw.
async fn spawn_upstream(status: StatusCode, body: &'static str) -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route("/get-summary", post(fake_summary))
        .with_state(Fake {
            status,
            body,
            seen: seen.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/get-summary"), seen)
}

fn client(url: String) -> HttpUpstream {
    HttpUpstream::new(UpstreamConfig {
        url,
        ..UpstreamConfig::default()
    })
    .unwrap()
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: "user".to_string(),
        content: serde_json::json!("hi"),
    }]
}

#[tokio::test]
async fn test_summary_returned() {
    let (url, seen) = spawn_upstream(StatusCode::OK, r#"{"summary":"hello there"}"#).await;

    let summary = client(url).summarize(&messages(), "req-123").await.unwrap();
    assert_eq!(summary, "hello there");

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.body.as_ref().unwrap(),
        &serde_json::json!({
            "website": "ask-ai-questions",
            "messages": [{"role": "user", "content": "hi"}]
        })
    );
    let headers = seen.headers.as_ref().unwrap();
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers["origin"], "https://askaiquestions.net");
    assert_eq!(headers["accept"], "*/*");
    assert!(headers["user-agent"].to_str().unwrap().starts_with("Mozilla/5.0"));
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let (url, _) = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;

    let err = client(url).summarize(&messages(), "req").await.unwrap_err();
    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_summary_field() {
    let (url, _) = spawn_upstream(StatusCode::OK, r#"{"result":"hello"}"#).await;

    let err = client(url).summarize(&messages(), "req").await.unwrap_err();
    assert!(matches!(err, UpstreamError::MissingSummary));
}

#[tokio::test]
async fn test_non_json_body() {
    let (url, _) = spawn_upstream(StatusCode::OK, "<html>gateway timeout</html>").await;

    let err = client(url).summarize(&messages(), "req").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_upstream() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}/get-summary"))
        .summarize(&messages(), "req")
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
}
