//! ONNX image classifier backing the safety gate.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use crate::config::SafetyModelConfig;
use crate::error::PipelineError;
use crate::math::softmax;

use super::preprocess::{preprocess, Normalization};
use super::session::{flatten, load_session, lock_error};
use super::{ImageClassifier, Prediction};

/// A ViT-style classifier: `pixel_values` in, `logits` out.
pub struct OnnxImageClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    norm: Normalization,
}

impl OnnxImageClassifier {
    pub fn new(model_dir: &Path, config: &SafetyModelConfig) -> Result<Self, PipelineError> {
        let session = load_session(&model_dir.join(&config.model))?;
        Ok(Self {
            session,
            labels: config.labels.clone(),
            norm: Normalization {
                image_size: config.image_size,
                mean: config.mean,
                std: config.std,
                filter: FilterType::Triangle,
            },
        })
    }
}

impl ImageClassifier for OnnxImageClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, PipelineError> {
        let (shape, data) = flatten(&preprocess(image, &self.norm));
        let input = Value::from_array((shape, data)).map_err(|e| PipelineError::Safety {
            message: format!("Failed to create input tensor: {e}"),
        })?;

        let mut session = self.session.lock().map_err(lock_error)?;
        let outputs = session
            .run(ort::inputs!["pixel_values" => input])
            .map_err(|e| PipelineError::Safety {
                message: format!("Classifier inference failed: {e}"),
            })?;

        let logits = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .ok_or_else(|| PipelineError::Safety {
                message: "Classifier did not produce logits".to_string(),
            })?;
        let (_shape, logits) =
            logits
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Safety {
                    message: format!("Failed to extract logits: {e}"),
                })?;

        Ok(rank_predictions(&self.labels, logits))
    }
}

/// Softmax the logits and pair them with labels, highest confidence first.
///
/// Classes without a configured label are named by index.
fn rank_predictions(labels: &[String], logits: &[f32]) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = softmax(logits)
        .into_iter()
        .enumerate()
        .map(|(i, score)| {
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class_{i}"));
            Prediction::new(label, score)
        })
        .collect();
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_predictions_sorted_descending() {
        let labels = vec!["normal".to_string(), "nsfw".to_string()];
        let ranked = rank_predictions(&labels, &[0.0, 3.0]);
        assert_eq!(ranked[0].label, "nsfw");
        assert!(ranked[0].score > ranked[1].score);
        let total: f32 = ranked.iter().map(|p| p.score).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rank_predictions_unlabeled_class() {
        let labels = vec!["normal".to_string()];
        let ranked = rank_predictions(&labels, &[0.0, 1.0]);
        assert_eq!(ranked[0].label, "class_1");
    }
}
