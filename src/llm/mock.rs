use async_trait::async_trait;
use std::sync::Mutex;

use super::{CompletionClient, CompletionError};

/// A recorded `complete` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub user_message: String,
}

/// Completion client for tests and offline runs.
///
/// Returns a fixed reply (or a fixed failure) and records every prompt it
/// was given.
#[derive(Debug, Default)]
pub struct MockCompletionClient {
    reply: String,
    fail_with_status: Option<u16>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletionClient {
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    /// A client whose every call fails with an API error of `status`.
    #[must_use]
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String, CompletionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: system.to_string(),
                user_message: user_message.to_string(),
            });
        }

        match self.fail_with_status {
            Some(status) => Err(CompletionError::Api {
                status,
                message: "mock failure".to_string(),
                retry_after_secs: None,
            }),
            None => Ok(self.reply.clone()),
        }
    }
}
