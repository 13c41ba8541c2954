//! # AbiaCS Assistant
//!
//! Retrieval-augmented question answering over Abia State Civil Service
//! regulations. PDFs are split into chunks, embedded locally and stored in
//! a SQLite vector index; questions are answered by a hosted Claude model
//! from the closest chunks, with the source documents cited.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON config file with environment overrides and validation
//! - **[`db`]**: SQLite + sqlite-vec vector index (documents, chunks, search)
//! - **[`embedder`]**: Text embedding via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`ingest`]**: PDF loading, recursive chunking, index rebuild
//! - **[`rag`]**: Input sanitizing, retrieval, prompt assembly, answering
//! - **[`llm`]**: Anthropic Messages API client with retry
//! - **[`server`]**: axum HTTP API with CORS and per-client rate limits

pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod server;
