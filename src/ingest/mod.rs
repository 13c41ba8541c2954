//! PDF ingestion: load pages, split them into chunks, embed the chunks and
//! swap the result into the vector index.

pub mod core;
pub mod pdf;
pub mod splitter;

pub use self::core::{IngestOutcome, IngestReport, Ingestor};
