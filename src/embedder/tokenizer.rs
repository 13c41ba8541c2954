//! WordPiece tokenization for the MiniLM encoder.
use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::EmbedderError;

/// all-MiniLM-L6-v2 was trained on sequences of at most 256 word pieces.
pub const MAX_SEQ_LENGTH: usize = 256;

pub struct BertTokenizer {
    inner: Tokenizer,
}

/// A tokenized batch laid out row-major as `[batch, seq_len]`, ready to be
/// wrapped in tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub batch: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<i64>,
}

impl EncodedBatch {
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        [self.batch, self.seq_len]
    }
}

impl BertTokenizer {
    /// Load `tokenizer.json` from `model_dir`, truncating at
    /// [`MAX_SEQ_LENGTH`] and padding each batch to its longest member.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self, EmbedderError> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(EmbedderError::TokenizerError(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to load tokenizer: {e}")))?;

        inner
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| EmbedderError::TokenizerError(format!("truncation config: {e}")))?;
        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self { inner })
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch, EmbedderError> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode batch: {e}")))?;

        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut input_ids = Vec::with_capacity(encodings.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(encodings.len() * seq_len);

        for enc in &encodings {
            if enc.get_ids().len() != seq_len {
                return Err(EmbedderError::TokenizerError(
                    "batch is not padded to a common length".to_string(),
                ));
            }
            input_ids.extend(enc.get_ids().iter().map(|&id| i64::from(id)));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| i64::from(m)));
        }

        Ok(EncodedBatch {
            batch: encodings.len(),
            seq_len,
            input_ids,
            attention_mask,
        })
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }
}
