//! The `image2text describe` command for analyzing a single image.

use clap::Args;
use image2text_core::{Config, Image2Text};
use std::path::PathBuf;

use super::PipelineArgs;

/// Arguments for the `describe` command.
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Image file to analyze
    #[arg(required = true)]
    pub image: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Print single-line JSON instead of pretty output
    #[arg(long)]
    pub compact: bool,
}

/// Execute the describe command.
pub async fn execute(args: DescribeArgs, config: Config) -> anyhow::Result<()> {
    let options = args.pipeline.to_options(&config);
    let pretty = config.output.pretty && !args.compact;
    let app = Image2Text::new(config);

    let analysis = app.describe(&args.image, &options).await?;

    if let Some(moderation) = analysis.moderation.as_ref().filter(|m| m.flagged) {
        tracing::warn!(
            "Caption flagged as potentially toxic ({:.2})",
            moderation.toxicity_score
        );
    }

    let json = if pretty {
        serde_json::to_string_pretty(&analysis)?
    } else {
        serde_json::to_string(&analysis)?
    };
    println!("{json}");

    Ok(())
}
