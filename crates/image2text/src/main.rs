//! Image2Text CLI - caption images, screen them for NSFW content, and derive SEO metadata.
//!
//! Image2Text takes a single image or a ZIP archive of images and outputs
//! structured results: a caption, a safety verdict, a toxicity score for the
//! caption, and SEO keywords with a meta description.
//!
//! # Usage
//!
//! ```bash
//! # Describe a single image
//! image2text describe photo.jpg
//!
//! # Process an archive into a CSV report
//! image2text batch photos.zip --output report.csv
//!
//! # View configuration
//! image2text config show
//!
//! # Manage models
//! image2text models download
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod cli;
mod logging;

/// Image2Text - caption images, screen them for NSFW content, and derive SEO metadata.
#[derive(Parser, Debug)]
#[command(name = "image2text")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "IMAGE2TEXT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption a single image and print the analysis as JSON
    Describe(cli::describe::DescribeArgs),

    /// Process a ZIP archive of images into a report
    Batch(cli::batch::BatchArgs),

    /// Manage models (list, download, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(expand_path);

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = load_config(config_path.as_deref())?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Image2Text v{}", image2text_core::VERSION);

    match cli.command {
        Commands::Describe(args) => cli::describe::execute(args, config).await,
        Commands::Batch(args) => cli::batch::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args, &config, config_path.as_deref()),
    }
}

/// An existing `--config` file must parse; a missing one (e.g. before
/// `config init`) or an unreadable default location falls back to defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<image2text_core::Config> {
    if let Some(path) = path {
        if !path.exists() {
            eprintln!(
                "Warning: Config file {} not found, using default configuration.",
                path.display()
            );
            return Ok(image2text_core::Config::default());
        }
        return image2text_core::Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()));
    }

    match image2text_core::Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `image2text config path`."
            );
            Ok(image2text_core::Config::default())
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
