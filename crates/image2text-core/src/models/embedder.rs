//! Sentence embedder used to score keyword relevance.
//!
//! Runs a MiniLM-style sentence transformer exported to ONNX: token ids in,
//! per-token hidden states out, mean-pooled over the attention mask and
//! L2-normalized so that a dot product is a cosine similarity.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;

use crate::config::SimilarityModelConfig;
use crate::error::PipelineError;

use super::session::{input_names, load_session, lock_error};
use super::TextEmbedder;

/// MiniLM sentence embedder wrapper.
pub struct MiniLmEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    max_tokens: usize,
    wants_token_type_ids: bool,
}

impl MiniLmEmbedder {
    /// Load the embedder from its model directory.
    pub fn new(model_dir: &Path, config: &SimilarityModelConfig) -> Result<Self, PipelineError> {
        let tokenizer_path = model_dir.join(&config.tokenizer);
        if !tokenizer_path.exists() {
            return Err(PipelineError::Model {
                message: format!(
                    "Tokenizer not found at {:?}. Run `image2text models download` first.",
                    tokenizer_path
                ),
            });
        }

        let session = load_session(&model_dir.join(&config.model))?;
        let wants_token_type_ids = session
            .lock()
            .map(|s| input_names(&s).iter().any(|n| n == "token_type_ids"))
            .map_err(lock_error)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;

        Ok(Self {
            session,
            tokenizer,
            max_tokens: config.max_tokens.max(1),
            wants_token_type_ids,
        })
    }

    /// Encode a batch of texts to normalized embeddings, one per input.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;

        // Pad to the longest sequence in the batch, capped at max_tokens.
        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_tokens))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            for (j, &id) in encoding.get_ids().iter().take(seq_len).enumerate() {
                input_ids[i * seq_len + j] = id as i64;
                attention_mask[i * seq_len + j] = 1;
            }
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let to_tensor = |data: Vec<i64>| {
            Value::from_array((shape.clone(), data)).map_err(|e| PipelineError::Model {
                message: format!("Failed to create input tensor: {e}"),
            })
        };

        let mut session = self.session.lock().map_err(lock_error)?;

        let ids_value = to_tensor(input_ids)?;
        let mask_value = to_tensor(attention_mask.clone())?;
        let outputs = if self.wants_token_type_ids {
            let type_value = to_tensor(vec![0i64; batch_size * seq_len])?;
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
                "token_type_ids" => type_value
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value
            ])
        }
        .map_err(|e| PipelineError::Model {
            message: format!("Embedder inference failed: {e}"),
        })?;

        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .ok_or_else(|| PipelineError::Model {
                message: "Embedder did not produce last_hidden_state".to_string(),
            })?;

        let (out_shape, data) =
            hidden
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Model {
                    message: format!("Failed to extract last_hidden_state: {e}"),
                })?;

        let hidden_dim = out_shape.last().copied().unwrap_or(0) as usize;
        if hidden_dim == 0 || data.len() != batch_size * seq_len * hidden_dim {
            return Err(PipelineError::Model {
                message: format!("Unexpected embedder output shape {:?}", out_shape),
            });
        }

        Ok((0..batch_size)
            .map(|i| {
                let rows = &data[i * seq_len * hidden_dim..(i + 1) * seq_len * hidden_dim];
                let mask = &attention_mask[i * seq_len..(i + 1) * seq_len];
                mean_pool(rows, mask, hidden_dim)
            })
            .collect())
    }
}

impl TextEmbedder for MiniLmEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Model {
                message: "Embedder returned empty result for single input".to_string(),
            })
    }
}

/// Average the token rows selected by `mask`, then L2-normalize.
fn mean_pool(rows: &[f32], mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0f32; hidden_dim];
    let mut count = 0f32;
    for (row, &m) in rows.chunks_exact(hidden_dim).zip(mask) {
        if m == 0 {
            continue;
        }
        count += 1.0;
        for (acc, &v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }
    if count > 0.0 {
        for v in pooled.iter_mut() {
            *v /= count;
        }
    }
    crate::math::l2_normalize_in_place(&mut pooled);
    pooled
}
