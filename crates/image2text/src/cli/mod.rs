//! Subcommand implementations.

pub mod batch;
pub mod config;
pub mod describe;
pub mod models;
pub mod types;

use clap::Args;
use image2text_core::{Config, ProcessingOptions};

use types::Tier;

/// Pipeline flags shared by `describe` and `batch`.
#[derive(Args, Debug, Default)]
pub struct PipelineArgs {
    /// Captioning model tier
    #[arg(long, value_enum)]
    pub tier: Option<Tier>,

    /// Maximum caption length in tokens
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Beam count (1 = greedy decoding)
    #[arg(long)]
    pub num_beams: Option<usize>,

    /// Logit temperature in (0, 1]
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Skip the NSFW safety check
    #[arg(long)]
    pub no_nsfw_check: bool,

    /// Skip caption toxicity moderation
    #[arg(long)]
    pub no_moderation: bool,

    /// Skip keyword and meta description extraction
    #[arg(long)]
    pub no_seo: bool,
}

impl PipelineArgs {
    /// Options seeded from config, with any flags given on the command line applied on top.
    pub fn to_options(&self, config: &Config) -> ProcessingOptions {
        let defaults = ProcessingOptions::from_config(config);
        ProcessingOptions {
            model_tier: self.tier.map(Into::into).unwrap_or(defaults.model_tier),
            max_length: self.max_length.unwrap_or(defaults.max_length),
            num_beams: self.num_beams.unwrap_or(defaults.num_beams),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            enable_nsfw_check: !self.no_nsfw_check,
            enable_moderation: !self.no_moderation,
            enable_seo: !self.no_seo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image2text_core::ModelTier;

    #[test]
    fn test_defaults_come_from_config() {
        let mut config = Config::default();
        config.generation.num_beams = 5;

        let options = PipelineArgs::default().to_options(&config);
        assert_eq!(options.num_beams, 5);
        assert_eq!(options.model_tier, ModelTier::Large);
        assert!(options.enable_nsfw_check && options.enable_moderation && options.enable_seo);
    }

    #[test]
    fn test_flags_override_config() {
        let args = PipelineArgs {
            tier: Some(Tier::Base),
            num_beams: Some(1),
            no_seo: true,
            ..Default::default()
        };
        let options = args.to_options(&Config::default());
        assert_eq!(options.model_tier, ModelTier::Base);
        assert_eq!(options.num_beams, 1);
        assert!(!options.enable_seo);
        assert!(options.enable_moderation);
    }
}
