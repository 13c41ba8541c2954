//! Error types shared by the ingest, retrieval and completion paths.

use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::ingest::pdf::PdfError;
use crate::llm::CompletionError;

/// Main error type for AbiaCS Assistant operations.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("{0}")]
    Ingest(String),

    #[error("An ingestion is already running")]
    IngestInProgress,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AppError>;
