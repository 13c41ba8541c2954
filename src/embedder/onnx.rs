/// ONNX Runtime embedder using the `ort` crate.
///
/// Runs the all-MiniLM-L6-v2 sentence-transformers export. Texts are
/// tokenized in padded batches, pooled over the attention mask and
/// L2-normalized, which reproduces `SentenceTransformer.encode` output.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::tokenizer::BertTokenizer;
use super::{Embedder, EmbedderError};

/// Texts sent to the model in one `run` call.
const BATCH_SIZE: usize = 32;

/// ONNX-backed embedder implementing the `Embedder` trait.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: BertTokenizer,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Create a new `OnnxEmbedder` by loading a model from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in `model_dir`.
    pub fn new(model_dir: &Path, dimensions: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = BertTokenizer::from_model_dir(model_dir)?;

        info!(
            "Embedding model loaded from {} (vocab size: {})",
            model_dir.display(),
            tokenizer.vocab_size()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let encoded = self.tokenizer.encode_batch(texts)?;
        let (batch, seq_len) = (encoded.batch, encoded.seq_len);
        let shape = encoded.shape();
        let attention_mask = encoded.attention_mask;

        let input_ids_val = Tensor::from_array((shape, encoded.input_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask_val = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;
        let token_type_ids_val = Tensor::from_array((shape, vec![0i64; batch * seq_len]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // last_hidden_state: [batch, seq_len, hidden]
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let tokens = batch * seq_len;
        if tokens == 0 || hidden_data.len() != tokens * self.dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: hidden_data.len().checked_div(tokens).unwrap_or(0),
            });
        }

        Ok(mean_pooling(
            hidden_data,
            &attention_mask,
            batch,
            seq_len,
            self.dimensions,
        )
        .iter()
        .map(|v| l2_normalize(v))
        .collect())
    }
}

impl Embedder for OnnxEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            debug!("Embedding batch {} ({} texts)", i + 1, batch.len());
            vectors.extend(self.run_batch(batch)?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is a flat array with shape `[batch, seq_len, hidden_size]`
/// and `attention_mask` has shape `[batch, seq_len]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    batch: usize,
    seq_len: usize,
    hidden_size: usize,
) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|b| {
            let mut result = vec![0.0f32; hidden_size];
            let mut mask_sum: f32 = 0.0;

            for t in 0..seq_len {
                let mask = attention_mask[b * seq_len + t] as f32;
                if mask == 0.0 {
                    continue;
                }
                mask_sum += mask;

                let offset = (b * seq_len + t) * hidden_size;
                for (h, acc) in result.iter_mut().enumerate() {
                    *acc += hidden_data[offset + h] * mask;
                }
            }

            if mask_sum > 0.0 {
                for v in &mut result {
                    *v /= mask_sum;
                }
            }
            result
        })
        .collect()
}

/// L2-normalize a vector, returning the normalized copy.
fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}
