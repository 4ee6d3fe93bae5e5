//! Production [`ModelLoader`] backed by ONNX files under the model directory.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ModelsConfig};
use crate::error::PipelineError;
use crate::types::ModelTier;

use super::{
    BlipCaptioner, CaptionModel, ImageClassifier, MiniLmEmbedder, ModelLoader,
    OnnxImageClassifier, TextEmbedder,
};

/// Loads every model slot from `general.model_dir`.
pub struct OnnxModelLoader {
    model_dir: PathBuf,
    models: ModelsConfig,
}

impl OnnxModelLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            model_dir: config.model_dir(),
            models: config.models.clone(),
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load_captioner(&self, tier: ModelTier) -> Result<Arc<dyn CaptionModel>, PipelineError> {
        let config = match tier {
            ModelTier::Base => &self.models.base,
            ModelTier::Large => &self.models.large,
        };
        let dir = self.model_dir.join(&config.dir);
        tracing::debug!("Loading {tier} from {:?}", dir);
        Ok(Arc::new(BlipCaptioner::new(tier, &dir, config)?))
    }

    fn load_similarity(&self) -> Result<Arc<dyn TextEmbedder>, PipelineError> {
        let config = &self.models.similarity;
        let dir = self.model_dir.join(&config.dir);
        tracing::debug!("Loading similarity embedder from {:?}", dir);
        Ok(Arc::new(MiniLmEmbedder::new(&dir, config)?))
    }

    fn load_safety(&self) -> Result<Arc<dyn ImageClassifier>, PipelineError> {
        let config = &self.models.safety;
        let dir = self.model_dir.join(&config.dir);
        tracing::debug!("Loading NSFW classifier from {:?}", dir);
        Ok(Arc::new(OnnxImageClassifier::new(&dir, config)?))
    }
}
