//! Core value types shared across the pipeline: model tiers and per-request options.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Config, GenerationConfig};
use crate::error::ConfigError;

/// Captioning model capability level, trading speed for caption quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelTier {
    /// Faster, smaller model
    Base,
    /// Slower model with better captions
    #[default]
    Large,
}

impl ModelTier {
    /// All supported tiers, in load order.
    pub const ALL: [ModelTier; 2] = [ModelTier::Base, ModelTier::Large];

    /// Parse a tier from a user-facing name.
    ///
    /// Accepts "base", "large", the model family names ("BLIP Base",
    /// "BLIP Large") and the "BLIP Large (Recommended)" menu label,
    /// case-insensitively. Returns `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        let normalized = normalized
            .strip_suffix("(recommended)")
            .unwrap_or(&normalized)
            .trim();
        let normalized = match normalized.strip_prefix("blip") {
            Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => normalized,
        };
        match normalized {
            "base" => Some(Self::Base),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    /// Display name used in reports and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Base => "BLIP Base",
            Self::Large => "BLIP Large",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Decoding controls for a single caption request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum caption length in tokens, including the start token
    pub max_length: usize,
    /// Beam count; 1 means greedy decoding
    pub num_beams: usize,
    /// Logit temperature
    pub temperature: f32,
    /// Size of n-grams that may not repeat
    pub no_repeat_ngram_size: usize,
    /// Stop beam search once enough hypotheses have finished
    pub early_stopping: bool,
    /// Exponent applied to hypothesis length when ranking finished beams
    pub length_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_length: config.max_length,
            num_beams: config.num_beams,
            temperature: config.temperature,
            no_repeat_ngram_size: config.no_repeat_ngram_size,
            early_stopping: config.early_stopping,
            length_penalty: config.length_penalty,
        }
    }
}

/// Per-request processing toggles.
///
/// Unknown fields are rejected when deserializing, and [`validate`](Self::validate)
/// enforces the numeric ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingOptions {
    /// Which captioning tier to use
    pub model_tier: ModelTier,
    /// Maximum caption length in tokens
    pub max_length: usize,
    /// Beam count; 1 means greedy decoding
    pub num_beams: usize,
    /// Logit temperature in (0, 1]
    pub temperature: f32,
    /// Run the safety gate before captioning
    pub enable_nsfw_check: bool,
    /// Score generated captions for toxicity
    pub enable_moderation: bool,
    /// Derive keywords and a meta description
    pub enable_seo: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        let generation = GenerationConfig::default();
        Self {
            model_tier: ModelTier::default(),
            max_length: generation.max_length,
            num_beams: generation.num_beams,
            temperature: generation.temperature,
            enable_nsfw_check: true,
            enable_moderation: true,
            enable_seo: true,
        }
    }
}

impl ProcessingOptions {
    /// Options seeded with the configured decoding defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_length: config.generation.max_length,
            num_beams: config.generation.num_beams,
            temperature: config.generation.temperature,
            ..Self::default()
        }
    }

    /// Check the numeric fields are within range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "max_length must be > 0".into(),
            ));
        }
        if self.num_beams == 0 {
            return Err(ConfigError::ValidationError(
                "num_beams must be >= 1".into(),
            ));
        }
        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return Err(ConfigError::ValidationError(
                "temperature must be in (0.0, 1.0]".into(),
            ));
        }
        Ok(())
    }

    /// Decoding parameters for this request, on top of the configured n-gram
    /// and stopping rules.
    pub fn generation_params(&self, config: &GenerationConfig) -> GenerationParams {
        GenerationParams {
            max_length: self.max_length,
            num_beams: self.num_beams,
            temperature: self.temperature,
            ..GenerationParams::from(config)
        }
    }
}
