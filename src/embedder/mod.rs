//! Sentence embeddings for chunks and queries.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("model produces {actual}-dimensional vectors, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Maps text to fixed-size, L2-normalized vectors.
///
/// Implementations are shared behind `Arc` between the HTTP handlers and
/// the ingest task, so they must be `Send + Sync`.
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbedderError::InferenceFailed("empty model output".to_string()))
    }
}
