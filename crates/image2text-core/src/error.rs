//! Error types for the Image2Text pipeline.
//!
//! Errors are organized by stage so callers can inspect the kind of failure
//! rather than parsing a message string. Most processing components never
//! return these to their callers: they fold them into a result value (a
//! verdict, a caption result, a batch record). Only configuration loading and
//! archive-level batch failures surface as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Image2Text operations.
#[derive(Error, Debug)]
pub enum Image2TextError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A model file could not be loaded, or a loaded model misbehaved
    #[error("Model error: {message}")]
    Model { message: String },

    /// An image could not be converted into model input
    #[error("Preprocessing error: {message}")]
    Preprocess { message: String },

    /// Safety classification failed
    #[error("Safety check failed: {message}")]
    Safety { message: String },

    /// Keyword extraction could not run with the configured settings
    #[error("SEO extraction failed: {message}")]
    Seo { message: String },

    /// The archive could not be opened or extracted
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Why a caption could not be produced.
///
/// Carried inside [`CaptionResult`](crate::caption::CaptionResult) instead of
/// being returned as an `Err`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    /// The registry has no model loaded for the requested tier
    #[error("{tier} model not available")]
    ModelUnavailable { tier: String },

    /// The model failed while encoding or decoding
    #[error("{0}")]
    Inference(String),

    /// The image could not be turned into model input
    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    /// Inference did not finish within the configured limit
    #[error("caption generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Convenience type alias for Image2Text results.
pub type Result<T> = std::result::Result<T, Image2TextError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
