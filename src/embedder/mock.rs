/// Deterministic stand-in for the ONNX embedder.
///
/// Used by tests and by `--mock-embedder` runs where no model files exist.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercase alphanumeric word is hashed into one signed bucket, so
/// texts sharing vocabulary score closer than unrelated ones. No model
/// files are needed.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

impl MockEmbedder {
    fn hash_words(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq == 0.0 {
            // No words: a fixed unit vector keeps cosine distance defined
            embedding[0] = 1.0;
            return embedding;
        }

        let inv = 1.0 / norm_sq.sqrt();
        for v in &mut embedding {
            *v *= inv;
        }
        embedding
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if self.dimensions == 0 {
            return Err(EmbedderError::InferenceFailed(
                "mock embedder configured with zero dimensions".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| self.hash_words(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
