use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::db::Db;
use crate::db::search::SearchResult;
use crate::embedder::Embedder;
use crate::error::Result;

/// Separator placed between passages in the prompt context.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Source label for a chunk whose document has no usable file name.
pub const UNKNOWN_SOURCE: &str = "Unknown document";

/// Passages selected for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub context: String,
    /// File names of the documents the context was drawn from, best match first.
    pub sources: Vec<String>,
}

#[derive(Clone)]
pub struct Retriever {
    db: Arc<TokioMutex<Db>>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    max_context_chars: usize,
}

impl Retriever {
    pub fn new(
        db: Arc<TokioMutex<Db>>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            top_k,
            max_context_chars,
        }
    }

    /// Embed `query` and collect the closest chunks into a prompt context.
    pub async fn search(&self, query: &str) -> Result<RetrievedContext> {
        let query_vector = self.embedder.embed(query)?;

        let results = {
            let db = self.db.lock().await;
            db.search(&query_vector, self.top_k)?
        };
        debug!("Retrieved {} chunks for query", results.len());

        Ok(assemble_context(&results, self.max_context_chars))
    }
}

/// File name part of a stored document path.
fn source_name(document_name: &str) -> String {
    Path::new(document_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}

/// Join passages in rank order while they fit in `max_chars`.
///
/// A first passage longer than the budget is cut to fit, so a non-empty
/// result set never yields an empty context.
fn assemble_context(results: &[SearchResult], max_chars: usize) -> RetrievedContext {
    let separator_len = PASSAGE_SEPARATOR.chars().count();
    let mut passages: Vec<&str> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut used = 0;

    for result in results {
        let text = result.chunk_content.as_str();
        let len = text.chars().count();
        let extra = if passages.is_empty() {
            len
        } else {
            len + separator_len
        };

        if used + extra <= max_chars {
            passages.push(text);
            used += extra;
        } else if passages.is_empty() {
            let cut = text
                .char_indices()
                .nth(max_chars)
                .map_or(text.len(), |(i, _)| i);
            passages.push(&text[..cut]);
            used = max_chars;
        } else {
            break;
        }

        let source = source_name(&result.document_name);
        if !sources.contains(&source) {
            sources.push(source);
        }

        if used >= max_chars {
            break;
        }
    }

    RetrievedContext {
        context: passages.join(PASSAGE_SEPARATOR),
        sources,
    }
}
