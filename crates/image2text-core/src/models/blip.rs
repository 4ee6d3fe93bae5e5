//! BLIP image captioning over two ONNX graphs.
//!
//! The vision encoder turns a 384×384 image into patch hidden states once per
//! caption. The text decoder is then run once per search step over every live
//! beam, cross-attending to those hidden states, and the logits at the last
//! position drive [`caption::decode`](crate::caption::decode).

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use crate::caption::decode::{self, SpecialTokens, TokenScorer};
use crate::config::CaptionModelConfig;
use crate::error::PipelineError;
use crate::types::{GenerationParams, ModelTier};

use super::preprocess::{preprocess, Normalization};
use super::session::{flatten, load_session, lock_error};
use super::CaptionModel;

/// One captioning tier: vision encoder, text decoder and tokenizer.
pub struct BlipCaptioner {
    tier: ModelTier,
    vision: Mutex<Session>,
    decoder: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    norm: Normalization,
    tokens: SpecialTokens,
}

impl BlipCaptioner {
    /// Load both graphs and the tokenizer from `model_dir`.
    pub fn new(
        tier: ModelTier,
        model_dir: &Path,
        config: &CaptionModelConfig,
    ) -> Result<Self, PipelineError> {
        let tokenizer_path = model_dir.join(&config.tokenizer);
        if !tokenizer_path.exists() {
            return Err(PipelineError::Model {
                message: format!("{tier} tokenizer not found at {:?}", tokenizer_path),
            });
        }

        let vision = load_session(&model_dir.join(&config.vision_model))?;
        let decoder = load_session(&model_dir.join(&config.text_decoder))?;
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load {tier} tokenizer: {e}"),
            }
        })?;

        Ok(Self {
            tier,
            vision,
            decoder,
            tokenizer,
            norm: Normalization {
                image_size: config.image_size,
                mean: config.mean,
                std: config.std,
                filter: FilterType::CatmullRom,
            },
            tokens: SpecialTokens {
                bos: config.bos_token_id,
                eos: config.eos_token_id,
            },
        })
    }

    /// Run the vision encoder. Returns the hidden-state shape and data.
    fn encode_image(&self, image: &DynamicImage) -> Result<(Vec<i64>, Vec<f32>), PipelineError> {
        let (shape, data) = flatten(&preprocess(image, &self.norm));
        let pixel_values = Value::from_array((shape, data)).map_err(|e| PipelineError::Preprocess {
            message: format!("Failed to create pixel tensor: {e}"),
        })?;

        let mut session = self.vision.lock().map_err(lock_error)?;
        let outputs = session
            .run(ort::inputs!["pixel_values" => pixel_values])
            .map_err(|e| PipelineError::Model {
                message: format!("{} vision encoder failed: {e}", self.tier),
            })?;

        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: "Vision encoder produced no outputs".to_string(),
            })?;
        let (shape, data) = hidden
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to extract vision hidden states: {e}"),
            })?;

        if shape.len() != 3 {
            return Err(PipelineError::Model {
                message: format!("Expected [1, patches, dim] hidden states, got {:?}", shape),
            });
        }
        Ok((shape.to_vec(), data.to_vec()))
    }
}

impl CaptionModel for BlipCaptioner {
    fn caption(
        &self,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> Result<String, PipelineError> {
        let (hidden_shape, hidden) = self.encode_image(image)?;
        let step = DecoderStep {
            decoder: &self.decoder,
            hidden_shape,
            hidden,
        };

        let ids = decode::generate(&step, self.tokens, params)?;
        let ids: Vec<u32> = ids.into_iter().map(|id| id as u32).collect();
        self.tokenizer
            .decode(&ids, true)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to decode caption tokens: {e}"),
            })
    }
}

/// Decoder bound to one image's encoder output.
struct DecoderStep<'a> {
    decoder: &'a Mutex<Session>,
    hidden_shape: Vec<i64>,
    hidden: Vec<f32>,
}

impl TokenScorer for DecoderStep<'_> {
    fn next_token_logits(&self, sequences: &[Vec<i64>]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch = sequences.len();
        let seq_len = sequences.first().map(Vec::len).unwrap_or(0);
        if batch == 0 || seq_len == 0 || sequences.iter().any(|s| s.len() != seq_len) {
            return Err(PipelineError::Model {
                message: "Decoder step needs equal-length, non-empty sequences".to_string(),
            });
        }

        let input_ids: Vec<i64> = sequences.iter().flatten().copied().collect();
        let token_shape = vec![batch as i64, seq_len as i64];

        // The image is shared by every beam; repeat its hidden states per row.
        let mut hidden_shape = self.hidden_shape.clone();
        hidden_shape[0] = batch as i64;
        let hidden: Vec<f32> = std::iter::repeat(self.hidden.as_slice())
            .take(batch)
            .flatten()
            .copied()
            .collect();

        let tensor_error = |e: ort::Error| PipelineError::Model {
            message: format!("Failed to create decoder input: {e}"),
        };
        let ids_value = Value::from_array((token_shape.clone(), input_ids)).map_err(tensor_error)?;
        let mask_value =
            Value::from_array((token_shape, vec![1i64; batch * seq_len])).map_err(tensor_error)?;
        let hidden_value = Value::from_array((hidden_shape, hidden)).map_err(tensor_error)?;

        let mut session = self.decoder.lock().map_err(lock_error)?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
                "encoder_hidden_states" => hidden_value
            ])
            .map_err(|e| PipelineError::Model {
                message: format!("Text decoder failed: {e}"),
            })?;

        let logits = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .ok_or_else(|| PipelineError::Model {
                message: "Text decoder did not produce logits".to_string(),
            })?;
        let (shape, data) = logits
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to extract logits: {e}"),
            })?;

        let vocab = shape.last().copied().unwrap_or(0) as usize;
        if vocab == 0 || data.len() != batch * seq_len * vocab {
            return Err(PipelineError::Model {
                message: format!("Unexpected decoder logits shape {:?}", shape),
            });
        }
        Ok(last_position_rows(data, batch, seq_len, vocab))
    }
}

/// Slice `[batch, seq_len, vocab]` logits down to the last position of each row.
fn last_position_rows(data: &[f32], batch: usize, seq_len: usize, vocab: usize) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|b| {
            let start = (b * seq_len + seq_len - 1) * vocab;
            data[start..start + vocab].to_vec()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_position_rows() {
        // batch 2, seq_len 2, vocab 3
        let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let rows = last_position_rows(&data, 2, 2, 3);
        assert_eq!(rows, vec![vec![3.0, 4.0, 5.0], vec![9.0, 10.0, 11.0]]);
    }

    #[test]
    fn test_missing_files_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlipCaptioner::new(ModelTier::Base, dir.path(), &CaptionModelConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("BLIP Base tokenizer not found"));
    }
}
