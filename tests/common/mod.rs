//! Helpers shared by the integration tests.
#![allow(dead_code)]

use abiacs_assistant::config::Config;
use abiacs_assistant::db::Db;
use abiacs_assistant::embedder::mock::MockEmbedder;
use abiacs_assistant::ingest::pdf::test_support;
use abiacs_assistant::llm::MockCompletionClient;
use abiacs_assistant::server::AppState;
use std::path::Path;
use std::sync::Arc;

/// Write a PDF with one line of text per page; `""` makes a blank page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    test_support::write_pdf(path, pages).unwrap();
}

/// Config pointing at `documents_dir`, otherwise defaults.
pub fn test_config(documents_dir: &Path) -> Config {
    Config {
        documents_dir: documents_dir.to_string_lossy().into_owned(),
        ..Config::default()
    }
}

/// App state over an in-memory index with the mock embedder.
pub fn test_state(config: Config, llm: Arc<MockCompletionClient>) -> AppState {
    let embedder = Arc::new(MockEmbedder::new(config.model.dimensions));
    let db = Db::open_in_memory(config.model.dimensions).unwrap();
    AppState::new(config, db, embedder, llm).unwrap()
}
