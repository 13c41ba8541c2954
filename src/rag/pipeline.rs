use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::prompt::build_system_prompt;
use super::retriever::Retriever;
use super::sanitize::sanitize_input;
use crate::error::{AppError, Result};
use crate::llm::CompletionClient;

/// A generated answer and the documents it was grounded on.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatAnswer {
    pub response: String,
    pub sources: Vec<String>,
    pub conversation_id: String,
}

/// Sanitize, retrieve, prompt, complete.
#[derive(Clone)]
pub struct Pipeline {
    retriever: Retriever,
    llm: Arc<dyn CompletionClient>,
    max_message_chars: usize,
}

impl Pipeline {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn CompletionClient>,
        max_message_chars: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            max_message_chars,
        }
    }

    /// Answer one question. A missing `conversation_id` gets a fresh one.
    pub async fn answer(
        &self,
        message: &str,
        conversation_id: Option<String>,
    ) -> Result<ChatAnswer> {
        let message = sanitize_input(message, self.max_message_chars);
        if message.is_empty() {
            return Err(AppError::EmptyMessage);
        }

        let conversation_id = conversation_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let retrieved = self.retriever.search(&message).await?;
        info!(
            "Answering with {} source(s), {} context chars",
            retrieved.sources.len(),
            retrieved.context.chars().count()
        );

        let system = build_system_prompt(&retrieved.context);
        let response = self.llm.complete(&system, &message).await?;

        Ok(ChatAnswer {
            response,
            sources: retrieved.sources,
            conversation_id,
        })
    }
}
