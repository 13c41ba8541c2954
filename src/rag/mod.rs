//! Retrieval-augmented answering over the indexed civil service documents.
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod sanitize;

pub use pipeline::{ChatAnswer, Pipeline};
pub use retriever::{RetrievedContext, Retriever};
pub use sanitize::sanitize_input;
