//! CLI enum types: model tier and report format.

use clap::ValueEnum;
use image2text_core::{ModelTier, OutputFormat};

/// Captioning model tier.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Tier {
    /// BLIP Base: faster, smaller model
    Base,
    /// BLIP Large: slower, better captions
    Large,
}

impl From<Tier> for ModelTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Base => ModelTier::Base,
            Tier::Large => ModelTier::Large,
        }
    }
}

/// Supported report formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReportFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Csv => OutputFormat::Csv,
            ReportFormat::Json => OutputFormat::Json,
            ReportFormat::Jsonl => OutputFormat::JsonLines,
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}
