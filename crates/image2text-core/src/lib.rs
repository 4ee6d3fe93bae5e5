//! Image2Text Core - captioning, safety, moderation and SEO pipeline.
//!
//! Image2Text wraps pretrained vision-language models behind a small pipeline
//! that takes images as input and outputs structured results: a caption, an
//! NSFW verdict, a toxicity score for the caption, and SEO keywords with a
//! meta description.
//!
//! # Architecture
//!
//! ```text
//! Image → Safety Gate → Caption (BLIP) → Moderation → SEO → ImageAnalysis
//! ZIP   → extract → [per image, same stages] → BatchReport → CSV / JSON
//! ```
//!
//! Models are loaded once per process by [`ModelRegistry`]; every component
//! degrades gracefully when a model is missing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use image2text_core::{Config, Image2Text, ProcessingOptions};
//!
//! #[tokio::main]
//! async fn main() -> image2text_core::Result<()> {
//!     let app = Image2Text::new(Config::load()?);
//!     let analysis = app
//!         .describe("./photo.jpg".as_ref(), &ProcessingOptions::default())
//!         .await?;
//!     println!("{:?}", analysis.caption);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod caption;
pub mod config;
pub mod error;
pub mod math;
pub mod models;
pub mod moderation;
pub mod output;
pub mod pipeline;
pub mod safety;
pub mod seo;
pub mod types;

pub use batch::{BatchItemRecord, BatchOrchestrator, BatchReport, ItemStatus};
pub use caption::{CaptionGenerator, CaptionResult};
pub use config::Config;
pub use error::{
    CaptionError, ConfigError, Image2TextError, PipelineError, PipelineResult, Result,
};
pub use models::{LoadedModels, ModelLoader, ModelRegistry, OnnxModelLoader};
pub use moderation::{ContentModerator, ModerationVerdict};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{Analyzer, ImageAnalysis};
pub use safety::{SafetyGate, SafetyOutcome, SafetyVerdict};
pub use seo::{SeoExtractor, SeoMetadata};
pub use types::{GenerationParams, ModelTier, ProcessingOptions};

use std::path::Path;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Image2Text processor - the main entry point.
///
/// Owns the configuration and the model registry. Models are loaded on the
/// first call that needs them.
pub struct Image2Text {
    config: Config,
    registry: ModelRegistry,
}

impl Image2Text {
    /// Create an instance that loads ONNX models from the configured model directory.
    pub fn new(config: Config) -> Self {
        let loader = OnnxModelLoader::new(&config);
        Self::with_loader(config, loader)
    }

    /// Create an instance with a custom model loader.
    pub fn with_loader(config: Config, loader: impl ModelLoader + 'static) -> Self {
        tracing::debug!("Initializing Image2Text v{}", VERSION);
        Self {
            config,
            registry: ModelRegistry::new(loader),
        }
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the model directory path.
    pub fn model_dir(&self) -> std::path::PathBuf {
        self.config.model_dir()
    }

    /// Load models if needed and build the pipeline components.
    pub fn analyzer(&self) -> Analyzer {
        let models = self.registry.ensure_loaded();
        Analyzer::new(&self.config, &models)
    }

    /// Build a batch orchestrator over the loaded models.
    pub fn batch(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.analyzer(), self.config.batch.clone())
    }

    /// Analyze a single image file.
    pub async fn describe(
        &self,
        path: &Path,
        options: &ProcessingOptions,
    ) -> Result<ImageAnalysis> {
        options.validate()?;
        Ok(self.analyzer().analyze_file(path, options).await?)
    }

    /// Process a ZIP archive of images.
    pub async fn process_archive(
        &self,
        path: &Path,
        options: &ProcessingOptions,
    ) -> Result<BatchReport> {
        options.validate()?;
        self.batch().run_file(path, options).await
    }
}
