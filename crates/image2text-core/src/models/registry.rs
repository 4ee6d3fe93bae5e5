//! Lazily-initialized, load-once registry of model instances.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::PipelineError;
use crate::types::ModelTier;

use super::{CaptionModel, ImageClassifier, TextEmbedder};

/// Creates model instances. Production code uses
/// [`OnnxModelLoader`](super::OnnxModelLoader); tests inject fakes.
pub trait ModelLoader: Send + Sync {
    fn load_captioner(&self, tier: ModelTier) -> Result<Arc<dyn CaptionModel>, PipelineError>;
    fn load_similarity(&self) -> Result<Arc<dyn TextEmbedder>, PipelineError>;
    fn load_safety(&self) -> Result<Arc<dyn ImageClassifier>, PipelineError>;
}

/// Every model slot after the one-time load. Slots whose load failed are empty.
#[derive(Default, Clone)]
pub struct LoadedModels {
    pub captioners: HashMap<ModelTier, Arc<dyn CaptionModel>>,
    pub similarity: Option<Arc<dyn TextEmbedder>>,
    pub safety: Option<Arc<dyn ImageClassifier>>,
}

impl LoadedModels {
    /// Captioner for a tier, if it loaded.
    pub fn captioner(&self, tier: ModelTier) -> Option<Arc<dyn CaptionModel>> {
        self.captioners.get(&tier).cloned()
    }

    /// Number of populated slots.
    pub fn loaded_count(&self) -> usize {
        self.captioners.len() + usize::from(self.similarity.is_some()) + usize::from(self.safety.is_some())
    }
}

/// Holds the loaded models for the lifetime of the process.
///
/// The first [`ensure_loaded`](Self::ensure_loaded) call loads every slot;
/// concurrent first callers block until that single load finishes. Later calls
/// return the same `Arc` without touching the loader.
pub struct ModelRegistry {
    loader: Box<dyn ModelLoader>,
    models: OnceLock<Arc<LoadedModels>>,
}

impl ModelRegistry {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            models: OnceLock::new(),
        }
    }

    /// Load every model on first call; return the cached set afterwards.
    pub fn ensure_loaded(&self) -> Arc<LoadedModels> {
        if let Some(models) = self.models.get() {
            tracing::debug!("Models already loaded, returning cached instances");
            return Arc::clone(models);
        }
        Arc::clone(self.models.get_or_init(|| Arc::new(self.load_all())))
    }

    /// Whether the one-time load has already happened.
    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    fn load_all(&self) -> LoadedModels {
        tracing::info!("Loading models: BLIP Base, BLIP Large, similarity embedder, NSFW classifier");
        let mut models = LoadedModels::default();

        for tier in ModelTier::ALL {
            match self.loader.load_captioner(tier) {
                Ok(model) => {
                    tracing::info!("{tier} loaded");
                    models.captioners.insert(tier, model);
                }
                Err(e) => tracing::error!("Error loading {tier}: {e}"),
            }
        }

        match self.loader.load_similarity() {
            Ok(model) => {
                tracing::info!("Similarity embedder loaded");
                models.similarity = Some(model);
            }
            Err(e) => tracing::error!("Error loading similarity model: {e}"),
        }

        match self.loader.load_safety() {
            Ok(model) => {
                tracing::info!("NSFW classifier loaded");
                models.safety = Some(model);
            }
            Err(e) => tracing::error!("Error loading NSFW classifier: {e}"),
        }

        tracing::info!("Model loading finished ({} of 4 available)", models.loaded_count());
        models
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory model doubles shared by tests across the crate.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use image::DynamicImage;

    use super::*;
    use crate::models::Prediction;
    use crate::types::GenerationParams;

    /// Returns a fixed caption, or fails when `fail` is set.
    pub struct FakeCaptioner {
        pub text: String,
        pub fail: bool,
    }

    impl CaptionModel for FakeCaptioner {
        fn caption(
            &self,
            _image: &DynamicImage,
            _params: &GenerationParams,
        ) -> Result<String, PipelineError> {
            if self.fail {
                return Err(PipelineError::Model {
                    message: "decoder exploded".to_string(),
                });
            }
            Ok(self.text.clone())
        }
    }

    /// Returns fixed predictions, or fails when `None`.
    pub struct FakeClassifier(pub Option<Vec<Prediction>>);

    impl ImageClassifier for FakeClassifier {
        fn classify(&self, _image: &DynamicImage) -> Result<Vec<Prediction>, PipelineError> {
            self.0.clone().ok_or_else(|| PipelineError::Safety {
                message: "classifier crashed".to_string(),
            })
        }
    }

    /// Embeds text as a bag of letter counts.
    pub struct FakeEmbedder;

    impl TextEmbedder for FakeEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
            let mut v = vec![0f32; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            crate::math::l2_normalize_in_place(&mut v);
            Ok(v)
        }
    }

    /// Loader that counts calls and can fail individual slots.
    #[derive(Default)]
    pub struct CountingLoader {
        pub calls: Arc<AtomicUsize>,
        pub fail_base: bool,
        pub fail_safety: bool,
    }

    impl ModelLoader for CountingLoader {
        fn load_captioner(&self, tier: ModelTier) -> Result<Arc<dyn CaptionModel>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_base && tier == ModelTier::Base {
                return Err(PipelineError::Model {
                    message: "weights missing".to_string(),
                });
            }
            Ok(Arc::new(FakeCaptioner {
                text: format!("a photo from {tier}"),
                fail: false,
            }))
        }

        fn load_similarity(&self) -> Result<Arc<dyn TextEmbedder>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeEmbedder))
        }

        fn load_safety(&self) -> Result<Arc<dyn ImageClassifier>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_safety {
                return Err(PipelineError::Model {
                    message: "classifier missing".to_string(),
                });
            }
            Ok(Arc::new(FakeClassifier(Some(vec![Prediction::new(
                "normal", 0.99,
            )]))))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fakes::CountingLoader;
    use super::*;

    #[test]
    fn test_ensure_loaded_is_cached() {
        let loader = CountingLoader::default();
        let calls = Arc::clone(&loader.calls);
        let registry = ModelRegistry::new(loader);

        assert!(!registry.is_loaded());
        let first = registry.ensure_loaded();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let second = registry.ensure_loaded();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let base_a = first.captioner(ModelTier::Base).unwrap();
        let base_b = second.captioner(ModelTier::Base).unwrap();
        assert!(Arc::ptr_eq(&base_a, &base_b));
    }

    #[test]
    fn test_failed_slot_is_absent_not_fatal() {
        let loader = CountingLoader {
            fail_base: true,
            fail_safety: true,
            ..Default::default()
        };
        let registry = ModelRegistry::new(loader);
        let models = registry.ensure_loaded();

        assert!(models.captioner(ModelTier::Base).is_none());
        assert!(models.captioner(ModelTier::Large).is_some());
        assert!(models.similarity.is_some());
        assert!(models.safety.is_none());
        assert_eq!(models.loaded_count(), 2);
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let loader = CountingLoader::default();
        let calls = Arc::clone(&loader.calls);
        let registry = Arc::new(ModelRegistry::new(loader));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.ensure_loaded())
            })
            .collect();
        let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
