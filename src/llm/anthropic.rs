//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionClient, CompletionError, RetryPolicy};
use crate::config::{Config, RetryConfig};

const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }
}

pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    retry: RetryPolicy,
    client: Client,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            base_url: "https://api.anthropic.com".to_string(),
            retry: RetryPolicy::default(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        Ok(Self::new(
            config.anthropic_api_key.clone(),
            config.claude_model.clone(),
            config.max_tokens,
        )?
        .with_base_url(&config.anthropic_base_url)
        .with_retry((&config.retry).into()))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_body(&self, system: &str, user_message: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [
                { "role": "user", "content": user_message }
            ]
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, CompletionError> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let json: serde_json::Value = resp.json().await?;
            return extract_text(&json);
        }

        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        let message = resp.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited { retry_after_secs },
            StatusCode::UNAUTHORIZED => CompletionError::Auth(message),
            _ => CompletionError::Api {
                status: status.as_u16(),
                message,
                retry_after_secs,
            },
        })
    }
}

/// Text of the first `text` content block of a Messages API response.
fn extract_text(json: &serde_json::Value) -> Result<String, CompletionError> {
    json["content"]
        .as_array()
        .and_then(|arr| arr.iter().find(|c| c["type"] == "text"))
        .and_then(|c| c["text"].as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::InvalidResponse("Missing content".to_string()))
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String, CompletionError> {
        let body = self.build_body(system, user_message);
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(text) => {
                    debug!("Completion succeeded after {} attempt(s)", attempt + 1);
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt, &e);
                    warn!(
                        "Completion attempt {} failed: {e}. Retrying in {:?}",
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    /// Serves `/v1/messages`, failing with `fail_status` for the first
    /// `failures` calls.
    async fn spawn_api(failures: usize, fail_status: u16) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));

        let handler = move |State(calls): State<Arc<AtomicUsize>>, headers: HeaderMap| async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(headers["x-api-key"], "test-key");
            assert_eq!(headers["anthropic-version"], API_VERSION);
            if n < failures {
                let status = AxumStatus::from_u16(fail_status).unwrap();
                return Response::builder()
                    .status(status)
                    .header("retry-after", "0")
                    .body(axum::body::Body::from("try later"))
                    .unwrap();
            }
            axum::Json(serde_json::json!({
                "content": [{ "type": "text", "text": "Annual leave is 30 days." }]
            }))
            .into_response()
        };

        let app = Router::new()
            .route("/v1/messages", post(handler))
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    fn client(base_url: &str, retry: RetryPolicy) -> AnthropicClient {
        AnthropicClient::new("test-key", "claude-test", 100)
            .unwrap()
            .with_base_url(base_url)
            .with_retry(retry)
    }

    #[test]
    fn test_build_body() {
        let c = AnthropicClient::new("k", "claude-test", 1500).unwrap();
        let body = c.build_body("be helpful", "how many leave days?");
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(body["system"], "be helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "how many leave days?");
    }

    #[test]
    fn test_extract_text() {
        let json = serde_json::json!({ "content": [{ "type": "text", "text": "hi" }] });
        assert_eq!(extract_text(&json).unwrap(), "hi");

        let after_thinking = serde_json::json!({
            "content": [
                { "type": "thinking", "thinking": "Look up the leave rules." },
                { "type": "text", "text": "Annual leave is 30 days." }
            ]
        });
        assert_eq!(
            extract_text(&after_thinking).unwrap(),
            "Annual leave is 30 days."
        );

        let no_text = serde_json::json!({ "content": [{ "type": "tool_use", "id": "t1" }] });
        assert!(matches!(
            extract_text(&no_text),
            Err(CompletionError::InvalidResponse(_))
        ));

        let empty = serde_json::json!({ "content": [] });
        assert!(matches!(
            extract_text(&empty),
            Err(CompletionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_retries_overloaded_then_succeeds() {
        let (url, calls) = spawn_api(2, 529).await;
        let text = client(&url, fast_retry(3))
            .complete("system", "question")
            .await
            .unwrap();
        assert_eq!(text, "Annual leave is 30 days.");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (url, calls) = spawn_api(10, 429).await;
        let err = client(&url, fast_retry(2))
            .complete("system", "question")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::RateLimited {
                retry_after_secs: Some(0)
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, calls) = spawn_api(10, 400).await;
        let err = client(&url, fast_retry(3))
            .complete("system", "question")
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Api { status: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_error_keeps_body() {
        let (url, calls) = spawn_api(10, 401).await;
        let err = client(&url, fast_retry(3))
            .complete("system", "question")
            .await
            .unwrap_err();
        match err {
            CompletionError::Auth(message) => assert_eq!(message, "try later"),
            other => panic!("expected Auth, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overloaded_carries_retry_after() {
        let (url, calls) = spawn_api(10, 529).await;
        let err = client(&url, fast_retry(1))
            .complete("system", "question")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Api {
                status: 529,
                retry_after_secs: Some(0),
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
