//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.image2text/models"),
        }
    }
}

/// Locations and token conventions for every model slot in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Base captioning tier (faster)
    pub base: CaptionModelConfig,

    /// Large captioning tier (better captions)
    pub large: CaptionModelConfig,

    /// Sentence-similarity text embedder
    pub similarity: SimilarityModelConfig,

    /// Image safety classifier
    pub safety: SafetyModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            base: CaptionModelConfig::with_dir("blip-image-captioning-base"),
            large: CaptionModelConfig::with_dir("blip-image-captioning-large"),
            similarity: SimilarityModelConfig::default(),
            safety: SafetyModelConfig::default(),
        }
    }
}

/// A BLIP-style captioner exported to ONNX as a vision encoder plus a text decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionModelConfig {
    /// Subdirectory of `general.model_dir`
    pub dir: String,

    /// Vision encoder file name
    pub vision_model: String,

    /// Text decoder file name
    pub text_decoder: String,

    /// Tokenizer file name
    pub tokenizer: String,

    /// Square input resolution expected by the vision encoder
    pub image_size: u32,

    /// Per-channel normalization mean (RGB)
    pub mean: [f32; 3],

    /// Per-channel normalization std (RGB)
    pub std: [f32; 3],

    /// Token that starts every caption
    pub bos_token_id: i64,

    /// Token that ends a caption
    pub eos_token_id: i64,

    /// Optional download source
    pub source: Option<ModelSource>,
}

impl CaptionModelConfig {
    fn with_dir(dir: &str) -> Self {
        Self {
            dir: dir.to_string(),
            ..Self::default()
        }
    }
}

impl Default for CaptionModelConfig {
    fn default() -> Self {
        Self {
            dir: "blip-image-captioning-base".to_string(),
            vision_model: "vision_model.onnx".to_string(),
            text_decoder: "text_decoder.onnx".to_string(),
            tokenizer: "tokenizer.json".to_string(),
            image_size: 384,
            mean: [0.481_454_66, 0.457_827_5, 0.408_210_73],
            std: [0.268_629_54, 0.261_302_6, 0.275_777_1],
            bos_token_id: 30522,
            eos_token_id: 102,
            source: None,
        }
    }
}

/// Sentence-transformer style embedder (mean pooled, L2-normalized).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityModelConfig {
    /// Subdirectory of `general.model_dir`
    pub dir: String,

    /// ONNX model file name
    pub model: String,

    /// Tokenizer file name
    pub tokenizer: String,

    /// Longest token sequence fed to the model
    pub max_tokens: usize,

    /// Optional download source
    pub source: Option<ModelSource>,
}

impl Default for SimilarityModelConfig {
    fn default() -> Self {
        Self {
            dir: "all-MiniLM-L6-v2".to_string(),
            model: "model.onnx".to_string(),
            tokenizer: "tokenizer.json".to_string(),
            max_tokens: 128,
            source: Some(ModelSource {
                repo: "Xenova/all-MiniLM-L6-v2".to_string(),
                files: vec![
                    RemoteFile::new("onnx/model.onnx", "model.onnx"),
                    RemoteFile::new("tokenizer.json", "tokenizer.json"),
                ],
            }),
        }
    }
}

/// Image classifier used by the safety gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyModelConfig {
    /// Subdirectory of `general.model_dir`
    pub dir: String,

    /// ONNX model file name
    pub model: String,

    /// Class labels in output index order
    pub labels: Vec<String>,

    /// Square input resolution
    pub image_size: u32,

    /// Per-channel normalization mean (RGB)
    pub mean: [f32; 3],

    /// Per-channel normalization std (RGB)
    pub std: [f32; 3],

    /// Optional download source
    pub source: Option<ModelSource>,
}

impl Default for SafetyModelConfig {
    fn default() -> Self {
        Self {
            dir: "nsfw-image-detection".to_string(),
            model: "model.onnx".to_string(),
            labels: vec!["normal".to_string(), "nsfw".to_string()],
            image_size: 224,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
            source: None,
        }
    }
}

/// A HuggingFace repository and the files to fetch from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    /// Repository id, e.g. "Xenova/all-MiniLM-L6-v2"
    pub repo: String,

    /// Files to download
    pub files: Vec<RemoteFile>,
}

/// One file inside a [`ModelSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Path inside the repository
    pub remote: String,

    /// File name inside the model's local directory
    pub local: String,
}

impl RemoteFile {
    pub fn new(remote: &str, local: &str) -> Self {
        Self {
            remote: remote.to_string(),
            local: local.to_string(),
        }
    }
}

/// Default decoding parameters for caption generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum caption length in tokens (including the start token)
    pub max_length: usize,

    /// Beam count; 1 means greedy decoding
    pub num_beams: usize,

    /// Logit temperature, in (0, 1]
    pub temperature: f32,

    /// Forbid repeating any n-gram of this size (0 disables)
    pub no_repeat_ngram_size: usize,

    /// Stop beam search once `num_beams` finished hypotheses exist
    pub early_stopping: bool,

    /// Exponent applied to hypothesis length when ranking finished beams
    pub length_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 50,
            num_beams: 3,
            temperature: 0.7,
            no_repeat_ngram_size: 2,
            early_stopping: true,
            length_penalty: 1.0,
        }
    }
}

/// Safety gate thresholds and label families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Scores strictly above this are blocked
    pub block_threshold: f32,

    /// Scores strictly above this (and not blocked) get a caution
    pub caution_threshold: f32,

    /// Labels that denote explicit content
    pub explicit_labels: Vec<String>,

    /// Labels that denote safe content
    pub safe_labels: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            block_threshold: 0.9,
            caution_threshold: 0.7,
            explicit_labels: ["nsfw", "porn", "adult", "explicit"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            safe_labels: ["safe", "sfw", "normal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Caption moderation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Captions scoring strictly above this are flagged as toxic
    pub flag_threshold: f32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            flag_threshold: 0.7,
        }
    }
}

/// Keyword and meta-description extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoConfig {
    /// Number of keywords to keep
    pub max_keywords: usize,

    /// Regex selecting keyword candidates from the lowercased caption
    pub token_pattern: String,

    /// Captions longer than this many words are truncated for the meta description
    pub meta_word_limit: usize,

    /// Hard cap on meta description length, in characters
    pub meta_max_chars: usize,

    /// Multiplier applied to the frequency of boost-vocabulary words
    pub boost_factor: f64,

    /// Stop words added to the built-in list
    pub extra_stop_words: Vec<String>,

    /// Boost words added to the built-in vocabulary
    pub extra_boost_words: Vec<String>,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            max_keywords: 5,
            token_pattern: r"\b[a-zA-Z]{4,}\b".to_string(),
            meta_word_limit: 20,
            meta_max_chars: 160,
            boost_factor: 1.5,
            extra_stop_words: vec![],
            extra_boost_words: vec![],
        }
    }
}

/// Batch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Images processed concurrently
    pub parallel_workers: usize,

    /// Use the request's decoding parameters instead of `[generation]` defaults
    pub inherit_generation_params: bool,

    /// File extensions treated as images (case-insensitive)
    pub image_extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 1,
            inherit_generation_params: false,
            image_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Caption generation timeout in milliseconds
    pub caption_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            caption_timeout_ms: 60000,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default report format ("csv", "json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "csv".to_string(),
            pretty: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
