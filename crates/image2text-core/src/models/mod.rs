//! Model capabilities and the process-wide model registry.
//!
//! The pipeline only sees three opaque capabilities:
//! - [`CaptionModel`]: image → caption text under given decoding parameters
//! - [`ImageClassifier`]: image → labeled confidences (used by the safety gate)
//! - [`TextEmbedder`]: text → unit-length embedding (used for SEO relevance)
//!
//! The ONNX-backed implementations live in the submodules and are created by
//! [`OnnxModelLoader`]. [`ModelRegistry`] loads each slot once and hands the
//! same instances to every component.
//!
//! # Usage
//!
//! ```rust,ignore
//! use image2text_core::models::{ModelRegistry, OnnxModelLoader};
//! use image2text_core::Config;
//!
//! let config = Config::load()?;
//! let registry = ModelRegistry::new(OnnxModelLoader::new(&config));
//! let models = registry.ensure_loaded();
//! println!("safety classifier loaded: {}", models.safety.is_some());
//! ```

mod blip;
mod classifier;
mod embedder;
mod loader;
pub(crate) mod preprocess;
pub(crate) mod registry;
mod session;

pub use blip::BlipCaptioner;
pub use classifier::OnnxImageClassifier;
pub use embedder::MiniLmEmbedder;
pub use loader::OnnxModelLoader;
pub use registry::{LoadedModels, ModelLoader, ModelRegistry};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::types::GenerationParams;

/// One (label, confidence) pair produced by an image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A model that describes an image in natural language.
pub trait CaptionModel: Send + Sync {
    /// Generate a raw caption (not yet trimmed) for an RGB image.
    fn caption(
        &self,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> Result<String, PipelineError>;
}

/// A model that assigns labeled confidences to an image.
pub trait ImageClassifier: Send + Sync {
    /// Predictions sorted by descending confidence.
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, PipelineError>;
}

/// A model that maps text to a unit-length embedding vector.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}
