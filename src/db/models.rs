use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub position: usize,
    /// 1-based page the chunk was cut from, when known.
    pub page: Option<u32>,
    pub content: &'a str,
}

/// A document ready to be written, with one embedding per chunk.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub filename: &'a str,
    pub modified_at: DateTime<Utc>,
    pub page_count: usize,
    pub chunks: &'a [Chunk<'a>],
    pub embeddings: &'a [Vec<f32>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub filename: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub modified_at: DateTime<Utc>,
}
