//! Caption generation with a selectable model tier.
//!
//! [`CaptionGenerator`] never returns an error: unsupported tiers, missing
//! models, inference failures and timeouts all come back as a
//! [`CaptionResult`] whose text explains what happened and whose `error`
//! field carries the typed cause.

pub mod decode;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::{CaptionError, PipelineError};
use crate::models::{CaptionModel, LoadedModels};
use crate::types::{GenerationParams, ModelTier, ProcessingOptions};

/// Text returned for a tier name that does not map to any model.
pub const MODEL_NOT_SUPPORTED: &str = "Model not supported";

/// Outcome of one caption request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionResult {
    /// Caption, or a human-readable failure message
    pub text: String,
    /// Display name of the tier, or the unrecognized name as given
    pub model_tier: String,
    /// Typed failure cause, if generation failed
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<CaptionError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<CaptionError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

impl CaptionResult {
    fn success(text: &str, tier: impl Into<String>) -> Self {
        Self {
            text: text.trim().to_string(),
            model_tier: tier.into(),
            error: None,
        }
    }

    fn failure(error: CaptionError, tier: impl Into<String>) -> Self {
        Self {
            text: format!("Generation error: {error}"),
            model_tier: tier.into(),
            error: Some(error),
        }
    }

    /// The failure message, if generation failed.
    pub fn generation_error(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.text != MODEL_NOT_SUPPORTED
    }
}

/// Captions images with whichever tiers the registry managed to load.
#[derive(Clone)]
pub struct CaptionGenerator {
    captioners: HashMap<ModelTier, Arc<dyn CaptionModel>>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl CaptionGenerator {
    /// `generation` supplies the n-gram and stopping rules that requests
    /// do not override.
    pub fn new(models: &LoadedModels, generation: &GenerationConfig, timeout_ms: u64) -> Self {
        Self {
            captioners: models.captioners.clone(),
            generation: generation.clone(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Caption with a tier given by name, using the options' decoding fields.
    ///
    /// An unrecognized tier name yields [`MODEL_NOT_SUPPORTED`] with no error.
    pub fn generate(
        &self,
        image: &DynamicImage,
        tier: &str,
        options: &ProcessingOptions,
    ) -> CaptionResult {
        let Some(parsed) = ModelTier::parse(tier) else {
            tracing::warn!("Unsupported model tier requested: {tier:?}");
            return CaptionResult {
                text: MODEL_NOT_SUPPORTED.to_string(),
                model_tier: tier.to_string(),
                error: None,
            };
        };
        self.generate_tier(image, parsed, &self.params_for(options))
    }

    /// Caption with a typed tier and full decoding parameters.
    pub fn generate_tier(
        &self,
        image: &DynamicImage,
        tier: ModelTier,
        params: &GenerationParams,
    ) -> CaptionResult {
        let Some(model) = self.captioners.get(&tier) else {
            return CaptionResult::failure(
                CaptionError::ModelUnavailable {
                    tier: tier.to_string(),
                },
                tier.to_string(),
            );
        };

        match model.caption(image, params) {
            Ok(text) => {
                tracing::debug!("{tier} caption: {text:?}");
                CaptionResult::success(&text, tier.to_string())
            }
            Err(e) => {
                tracing::error!("{tier} generation failed: {e}");
                let error = match e {
                    PipelineError::Preprocess { message } => CaptionError::Preprocess(message),
                    other => CaptionError::Inference(other.to_string()),
                };
                CaptionResult::failure(error, tier.to_string())
            }
        }
    }

    /// [`generate_tier`](Self::generate_tier) on a blocking thread, bounded
    /// by the configured caption timeout.
    pub async fn generate_with_timeout(
        &self,
        image: Arc<DynamicImage>,
        tier: ModelTier,
        params: GenerationParams,
    ) -> CaptionResult {
        let generator = self.clone();
        let timeout_ms = self.timeout.as_millis() as u64;
        let task =
            tokio::task::spawn_blocking(move || generator.generate_tier(&image, tier, &params));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => CaptionResult::failure(
                CaptionError::Inference(format!("caption task failed: {join_err}")),
                tier.to_string(),
            ),
            Err(_) => {
                tracing::warn!("{tier} caption timed out after {timeout_ms}ms");
                CaptionResult::failure(CaptionError::Timeout { timeout_ms }, tier.to_string())
            }
        }
    }

    /// Decoding parameters for a request, on top of the configured defaults.
    pub fn params_for(&self, options: &ProcessingOptions) -> GenerationParams {
        options.generation_params(&self.generation)
    }

    /// The configured default decoding parameters.
    pub fn default_params(&self) -> GenerationParams {
        GenerationParams::from(&self.generation)
    }
}
