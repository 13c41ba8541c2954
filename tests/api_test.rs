/// HTTP API tests against the axum router, driven in-process with `oneshot`.
mod common;

use abiacs_assistant::llm::MockCompletionClient;
use abiacs_assistant::server::rate_limit::RATE_LIMITED_MESSAGE;
use abiacs_assistant::server::{AppState, router};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use common::{test_config, test_state, write_pdf};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_on_empty_index() {
    let dir = tempdir().unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "ok", "documents_loaded": false, "chunk_count": 0 })
    );
}

#[tokio::test]
async fn test_suggested_questions() {
    let dir = tempdir().unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    let (status, body) = send(&state, get("/api/suggested-questions")).await;
    assert_eq!(status, StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 8);
    assert_eq!(questions[0], "How do I apply for annual leave?");
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let dir = tempdir().unwrap();
    let llm = Arc::new(MockCompletionClient::new("unused"));
    let state = test_state(test_config(dir.path()), llm.clone());

    let (status, body) = send(&state, post_json("/api/chat", json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Message cannot be empty." }));
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_chat_missing_message_is_unprocessable() {
    let dir = tempdir().unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    let (status, _) = send(
        &state,
        post_json("/api/chat", json!({ "conversation_id": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_ingest_then_chat() {
    let dir = tempdir().unwrap();
    write_pdf(
        &dir.path().join("promotion.pdf"),
        &["Promotion from GL 08 to GL 09 requires three years on the grade and a pass in the promotion examination."],
    );
    let llm = Arc::new(MockCompletionClient::new("Three years on GL 08."));
    let state = test_state(test_config(dir.path()), llm.clone());

    let (status, body) = send(&state, post_empty("/api/ingest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success", "chunks_loaded": 1 }));

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents_loaded"], true);
    assert_eq!(body["chunk_count"], 1);

    let (status, body) = send(
        &state,
        post_json(
            "/api/chat",
            json!({
                "message": "What are the requirements for promotion from GL 08 to GL 09?",
                "conversation_id": "conv-42"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Three years on GL 08.");
    assert_eq!(body["sources"], json!(["promotion.pdf"]));
    assert_eq!(body["conversation_id"], "conv-42");

    assert!(llm.calls()[0].system.contains("promotion examination"));
}

#[tokio::test]
async fn test_ingest_without_documents_folder() {
    let dir = tempdir().unwrap();
    let docs = dir.path().join("documents");
    let state = test_state(test_config(&docs), Arc::new(MockCompletionClient::new("")));

    let (status, body) = send(&state, post_empty("/api/ingest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success", "chunks_loaded": 0 }));
    assert!(docs.is_dir());
}

#[tokio::test]
async fn test_ingest_failure_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    let (status, body) = send(&state, post_empty("/api/ingest")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Ingestion failed: ")
    );
}

#[tokio::test]
async fn test_concurrent_ingest_is_rejected() {
    let dir = tempdir().unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    let _running = state.ingest_guard.lock().await;
    let (status, body) = send(&state, post_empty("/api/ingest")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_chat_completion_failure_is_500() {
    let dir = tempdir().unwrap();
    let state = test_state(
        test_config(dir.path()),
        Arc::new(MockCompletionClient::failing(529)),
    );

    let (status, body) = send(&state, post_json("/api/chat", json!({ "message": "hello" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_chat_rate_limit() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.rate_limit = "2/minute".to_string();
    let state = test_state(config, Arc::new(MockCompletionClient::new("ok")));

    for _ in 0..2 {
        let (status, _) = send(&state, post_json("/api/chat", json!({ "message": "hi" }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&state, post_json("/api/chat", json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({ "error": RATE_LIMITED_MESSAGE }));

    // Other routes keep their own budget
    let (status, _) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ingest_rate_limit() {
    let dir = tempdir().unwrap();
    let state = test_state(test_config(dir.path()), Arc::new(MockCompletionClient::new("")));

    for _ in 0..2 {
        let (status, _) = send(&state, post_empty("/api/ingest")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&state, post_empty("/api/ingest")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cors_preflight() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.frontend_url = "https://abiacs.example.org".to_string();
    let state = test_state(config, Arc::new(MockCompletionClient::new("")));

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    };

    for origin in ["https://abiacs.example.org", "http://localhost:3000"] {
        let response = router(state.clone()).oneshot(preflight(origin)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    let response = router(state.clone())
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
