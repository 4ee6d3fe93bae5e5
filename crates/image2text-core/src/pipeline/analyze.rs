//! Single-image workflow: safety gate → caption → moderation → SEO.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;

use crate::caption::{CaptionGenerator, CaptionResult};
use crate::config::Config;
use crate::error::PipelineError;
use crate::models::LoadedModels;
use crate::moderation::{ContentModerator, ModerationVerdict};
use crate::safety::{SafetyGate, SafetyOutcome, SafetyVerdict, LABEL_ERROR};
use crate::seo::{SeoExtractor, SeoMetadata};
use crate::types::ProcessingOptions;

use super::decode::ImageDecoder;

/// Everything the pipeline found out about one image.
///
/// Stages that were disabled or skipped are `None`. A blocked image has a
/// safety verdict and nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct ImageAnalysis {
    pub safety: Option<SafetyVerdict>,
    pub caption: Option<CaptionResult>,
    pub moderation: Option<ModerationVerdict>,
    pub seo: Option<SeoMetadata>,
}

impl ImageAnalysis {
    pub fn is_blocked(&self) -> bool {
        self.safety.as_ref().is_some_and(SafetyVerdict::is_blocked)
    }

    pub fn needs_caution(&self) -> bool {
        self.safety
            .as_ref()
            .is_some_and(|v| v.outcome == SafetyOutcome::Caution)
    }
}

/// The pipeline components, built once from config and the loaded models.
#[derive(Clone)]
pub struct Analyzer {
    decoder: ImageDecoder,
    safety: SafetyGate,
    captioner: CaptionGenerator,
    moderator: ContentModerator,
    seo: SeoExtractor,
}

impl Analyzer {
    pub fn new(config: &Config, models: &LoadedModels) -> Self {
        Self {
            decoder: ImageDecoder::new(config.limits.clone()),
            safety: SafetyGate::new(models.safety.clone(), config.safety.clone()),
            captioner: CaptionGenerator::new(
                models,
                &config.generation,
                config.limits.caption_timeout_ms,
            ),
            moderator: ContentModerator::new(config.moderation.clone()),
            seo: SeoExtractor::new(config.seo.clone(), models.similarity.clone()),
        }
    }

    pub fn decoder(&self) -> &ImageDecoder {
        &self.decoder
    }

    pub fn captioner(&self) -> &CaptionGenerator {
        &self.captioner
    }

    pub fn moderator(&self) -> &ContentModerator {
        &self.moderator
    }

    pub fn seo(&self) -> &SeoExtractor {
        &self.seo
    }

    /// Decode an image file and analyze it.
    pub async fn analyze_file(
        &self,
        path: &Path,
        options: &ProcessingOptions,
    ) -> Result<ImageAnalysis, PipelineError> {
        let decoded = self.decoder.decode_file(path).await?;
        tracing::debug!(
            "Decoded {:?} ({}x{}, {:?})",
            path,
            decoded.width,
            decoded.height,
            decoded.format
        );
        Ok(self.analyze(decoded.image, options).await)
    }

    /// Analyze a decoded image. Never fails; stage problems are reported in
    /// the returned values.
    pub async fn analyze(&self, image: DynamicImage, options: &ProcessingOptions) -> ImageAnalysis {
        let image = Arc::new(image);

        let safety = if options.enable_nsfw_check {
            let verdict = self.check_safety(Arc::clone(&image)).await;
            match verdict.outcome {
                SafetyOutcome::Blocked => {
                    tracing::warn!(
                        "NSFW content detected with {:.1}% confidence, processing blocked",
                        verdict.score * 100.0
                    );
                    return ImageAnalysis {
                        safety: Some(verdict),
                        caption: None,
                        moderation: None,
                        seo: None,
                    };
                }
                SafetyOutcome::Caution => tracing::warn!(
                    "Potential NSFW content detected ({:.1}% confidence)",
                    verdict.score * 100.0
                ),
                SafetyOutcome::Safe => tracing::info!("Image safety check passed"),
                SafetyOutcome::Unavailable => {
                    tracing::warn!("NSFW check unavailable: {}", verdict.label)
                }
            }
            Some(verdict)
        } else {
            None
        };

        let params = self.captioner.params_for(options);
        let caption = self
            .captioner
            .generate_with_timeout(image, options.model_tier, params)
            .await;
        tracing::info!("Caption generated: {}", caption.text);

        if !caption.is_success() {
            return ImageAnalysis {
                safety,
                caption: Some(caption),
                moderation: None,
                seo: None,
            };
        }

        let moderation = options
            .enable_moderation
            .then(|| self.moderator.moderate(&caption.text));
        let seo = options
            .enable_seo
            .then(|| self.seo.extract(&caption.text, self.seo.max_keywords()));

        ImageAnalysis {
            safety,
            caption: Some(caption),
            moderation,
            seo,
        }
    }

    /// Run the safety gate on a blocking thread.
    pub(crate) async fn check_safety(&self, image: Arc<DynamicImage>) -> SafetyVerdict {
        let gate = self.safety.clone();
        match tokio::task::spawn_blocking(move || gate.check(&image)).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!("NSFW detection task failed: {e}");
                SafetyVerdict::unavailable(LABEL_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::fakes::{FakeCaptioner, FakeClassifier, FakeEmbedder};
    use crate::models::Prediction;
    use crate::types::ModelTier;

    fn models(nsfw: f32, caption: &str) -> LoadedModels {
        let mut models = LoadedModels::default();
        models.captioners.insert(
            ModelTier::Large,
            Arc::new(FakeCaptioner {
                text: caption.to_string(),
                fail: false,
            }),
        );
        models.safety = Some(Arc::new(FakeClassifier(Some(vec![
            Prediction::new("nsfw", nsfw),
            Prediction::new("normal", 1.0 - nsfw),
        ]))));
        models.similarity = Some(Arc::new(FakeEmbedder));
        models
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(8, 8)
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let analyzer = Analyzer::new(
            &Config::default(),
            &models(0.05, "a beautiful modern kitchen"),
        );
        let result = analyzer.analyze(image(), &ProcessingOptions::default()).await;

        assert!(!result.is_blocked());
        assert_eq!(result.safety.unwrap().outcome, SafetyOutcome::Safe);
        assert_eq!(result.caption.unwrap().text, "a beautiful modern kitchen");
        assert_eq!(result.moderation.unwrap().toxicity_score, 0.0);
        let seo = result.seo.unwrap();
        assert_eq!(seo.keywords, vec!["beautiful", "modern", "kitchen"]);
        assert!(seo.relevance.is_some());
    }

    #[tokio::test]
    async fn test_blocked_image_stops_pipeline() {
        let analyzer = Analyzer::new(&Config::default(), &models(0.97, "anything"));
        let result = analyzer.analyze(image(), &ProcessingOptions::default()).await;

        assert!(result.is_blocked());
        assert!(result.caption.is_none());
        assert!(result.seo.is_none());
    }

    #[tokio::test]
    async fn test_caution_continues() {
        let analyzer = Analyzer::new(&Config::default(), &models(0.8, "a person at the beach"));
        let result = analyzer.analyze(image(), &ProcessingOptions::default()).await;

        assert!(result.needs_caution());
        assert!(result.caption.is_some());
    }

    #[tokio::test]
    async fn test_disabled_stages_are_skipped() {
        let analyzer = Analyzer::new(&Config::default(), &models(0.97, "a cat"));
        let options = ProcessingOptions {
            enable_nsfw_check: false,
            enable_moderation: false,
            enable_seo: false,
            ..Default::default()
        };
        let result = analyzer.analyze(image(), &options).await;

        assert!(result.safety.is_none());
        assert_eq!(result.caption.unwrap().text, "a cat");
        assert!(result.moderation.is_none());
        assert!(result.seo.is_none());
    }

    #[tokio::test]
    async fn test_missing_tier_skips_text_stages() {
        let analyzer = Analyzer::new(&Config::default(), &models(0.0, "a cat"));
        let options = ProcessingOptions {
            model_tier: ModelTier::Base,
            ..Default::default()
        };
        let result = analyzer.analyze(image(), &options).await;

        let caption = result.caption.unwrap();
        assert!(caption.text.starts_with("Generation error"));
        assert!(result.seo.is_none());
    }
}
