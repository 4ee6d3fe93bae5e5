//! NSFW screening of input images.
//!
//! The gate interprets whatever labels the classifier emits through two
//! configurable label families. An explicit label's confidence is the unsafety
//! score directly; a safe label's confidence is inverted. The first family
//! that matches wins, explicit labels taking precedence.

use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::SafetyConfig;
use crate::models::{ImageClassifier, Prediction};

/// Label reported when no classifier is loaded.
pub const LABEL_MODEL_UNAVAILABLE: &str = "Model not available";
/// Label reported when the classifier failed.
pub const LABEL_ERROR: &str = "error";
/// Label reported when no known label family matched.
pub const LABEL_UNKNOWN: &str = "unknown";
/// Label reported for a safe-family match.
pub const LABEL_SAFE: &str = "safe";

/// How the pipeline should treat an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyOutcome {
    Safe,
    Caution,
    Blocked,
    /// The check could not produce a meaningful score
    Unavailable,
}

/// Result of screening one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Unsafety score in [0, 1]
    pub score: f32,
    pub label: String,
    pub outcome: SafetyOutcome,
}

impl SafetyVerdict {
    pub(crate) fn unavailable(label: &str) -> Self {
        Self {
            score: 0.0,
            label: label.to_string(),
            outcome: SafetyOutcome::Unavailable,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.outcome == SafetyOutcome::Blocked
    }
}

/// Screens images with the registry's safety classifier.
#[derive(Clone)]
pub struct SafetyGate {
    classifier: Option<Arc<dyn ImageClassifier>>,
    config: SafetyConfig,
}

impl SafetyGate {
    pub fn new(classifier: Option<Arc<dyn ImageClassifier>>, config: SafetyConfig) -> Self {
        Self { classifier, config }
    }

    /// Classify an image. Never fails; problems yield an `Unavailable` verdict.
    pub fn check(&self, image: &DynamicImage) -> SafetyVerdict {
        let Some(classifier) = &self.classifier else {
            tracing::warn!("NSFW detector unavailable");
            return SafetyVerdict::unavailable(LABEL_MODEL_UNAVAILABLE);
        };

        match classifier.classify(image) {
            Ok(predictions) => {
                tracing::debug!("NSFW raw results: {predictions:?}");
                self.verdict_from_predictions(&predictions)
            }
            Err(e) => {
                tracing::error!("NSFW detection error: {e}");
                SafetyVerdict::unavailable(LABEL_ERROR)
            }
        }
    }

    /// Interpret classifier output through the configured label families.
    pub fn verdict_from_predictions(&self, predictions: &[Prediction]) -> SafetyVerdict {
        let in_family = |family: &[String], label: &str| {
            family.iter().any(|l| l.eq_ignore_ascii_case(label))
        };

        if let Some(p) = predictions
            .iter()
            .find(|p| in_family(&self.config.explicit_labels, &p.label))
        {
            let score = p.score.clamp(0.0, 1.0);
            tracing::warn!("NSFW content detected: {} ({score:.2})", p.label);
            return SafetyVerdict {
                score,
                label: p.label.clone(),
                outcome: self.outcome_for(score),
            };
        }

        if let Some(p) = predictions
            .iter()
            .find(|p| in_family(&self.config.safe_labels, &p.label))
        {
            let score = (1.0 - p.score).clamp(0.0, 1.0);
            return SafetyVerdict {
                score,
                label: LABEL_SAFE.to_string(),
                outcome: self.outcome_for(score),
            };
        }

        tracing::warn!("Unknown NSFW classification");
        SafetyVerdict::unavailable(LABEL_UNKNOWN)
    }

    fn outcome_for(&self, score: f32) -> SafetyOutcome {
        if score > self.config.block_threshold {
            SafetyOutcome::Blocked
        } else if score > self.config.caution_threshold {
            SafetyOutcome::Caution
        } else {
            SafetyOutcome::Safe
        }
    }
}
