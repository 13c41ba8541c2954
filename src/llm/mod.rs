//! Hosted language-model completion.
//!
//! The pipeline only needs "system prompt + one user message in, text
//! out", so that is the whole [`CompletionClient`] surface.

pub mod anthropic;
pub mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use anthropic::AnthropicClient;
pub use mock::MockCompletionClient;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by provider (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Whether a retry has a chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } => true,
            // 529 is Anthropic's "overloaded"
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } | Self::Api { retry_after_secs, .. } => {
                retry_after_secs.map(Duration::from_secs)
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `system` and a single user turn; return the model's text.
    async fn complete(&self, system: &str, user_message: &str) -> Result<String, CompletionError>;
}

/// Exponential backoff schedule for transient completion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Delay to wait after `err` on retry number `attempt`. A server
    /// `retry-after` wins over the computed backoff but is still capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, err: &CompletionError) -> Duration {
        err.retry_after()
            .map_or_else(|| self.backoff(attempt), |d| d.min(self.max_backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let err = CompletionError::RateLimited {
            retry_after_secs: Some(2),
        };
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(2));

        let err = CompletionError::RateLimited {
            retry_after_secs: Some(600),
        };
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(8));

        let overloaded = CompletionError::Api {
            status: 529,
            message: "overloaded".into(),
            retry_after_secs: Some(3),
        };
        assert_eq!(policy.delay_for(0, &overloaded), Duration::from_secs(3));
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            CompletionError::Api {
                status: 529,
                message: "overloaded".into(),
                retry_after_secs: None
            }
            .is_transient()
        );
        assert!(
            !CompletionError::Api {
                status: 400,
                message: "bad request".into(),
                retry_after_secs: None
            }
            .is_transient()
        );
        assert!(!CompletionError::Auth("bad key".into()).is_transient());
        assert!(
            CompletionError::RateLimited {
                retry_after_secs: None
            }
            .is_transient()
        );
    }
}
