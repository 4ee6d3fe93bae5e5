//! The `image2text models` command for managing model files.

use clap::{Args, Subcommand};
use image2text_core::config::ModelSource;
use image2text_core::Config;
use std::path::{Path, PathBuf};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download model files for every model with a configured source
    Download {
        /// Re-download files that already exist
        #[arg(long)]
        force: bool,
    },

    /// List configured models and which of their files are installed
    List,

    /// Show model directory path
    Path,
}

/// One configured model and the files it needs on disk.
struct ModelEntry<'a> {
    name: &'static str,
    dir: PathBuf,
    files: Vec<&'a str>,
    source: Option<&'a ModelSource>,
}

impl ModelEntry<'_> {
    fn is_installed(&self) -> bool {
        self.files.iter().all(|file| self.dir.join(file).exists())
    }
}

fn model_entries(config: &Config) -> Vec<ModelEntry<'_>> {
    let model_dir = config.model_dir();
    let models = &config.models;

    vec![
        ModelEntry {
            name: "BLIP Base",
            dir: model_dir.join(&models.base.dir),
            files: vec![
                models.base.vision_model.as_str(),
                models.base.text_decoder.as_str(),
                models.base.tokenizer.as_str(),
            ],
            source: models.base.source.as_ref(),
        },
        ModelEntry {
            name: "BLIP Large",
            dir: model_dir.join(&models.large.dir),
            files: vec![
                models.large.vision_model.as_str(),
                models.large.text_decoder.as_str(),
                models.large.tokenizer.as_str(),
            ],
            source: models.large.source.as_ref(),
        },
        ModelEntry {
            name: "Similarity",
            dir: model_dir.join(&models.similarity.dir),
            files: vec![models.similarity.model.as_str(), models.similarity.tokenizer.as_str()],
            source: models.similarity.source.as_ref(),
        },
        ModelEntry {
            name: "NSFW classifier",
            dir: model_dir.join(&models.safety.dir),
            files: vec![models.safety.model.as_str()],
            source: models.safety.source.as_ref(),
        },
    ]
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { force } => {
            let client = reqwest::Client::new();
            let mut downloaded = 0usize;

            for entry in model_entries(config) {
                let Some(source) = entry.source else {
                    tracing::info!(
                        "{}: no download source configured, export the ONNX files to {}",
                        entry.name,
                        entry.dir.display()
                    );
                    continue;
                };
                downloaded += download_source(&client, source, &entry.dir, force).await?;
            }

            tracing::info!("All downloads complete ({downloaded} files fetched).");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            println!("Models:");
            println!("  Directory: {}\n", model_dir.display());

            for entry in model_entries(config) {
                let status = if entry.is_installed() {
                    "ready"
                } else {
                    "not installed"
                };
                println!("  {:20} {}", entry.name, status);
                for file in &entry.files {
                    let marker = if entry.dir.join(file).exists() {
                        "x"
                    } else {
                        " "
                    };
                    println!("    [{marker}] {}", entry.dir.join(file).display());
                }
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

/// Fetch every file of a source into `dir`. Returns how many were downloaded.
async fn download_source(
    client: &reqwest::Client,
    source: &ModelSource,
    dir: &Path,
    force: bool,
) -> anyhow::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut count = 0;

    for file in &source.files {
        let dest = dir.join(&file.local);
        if dest.exists() && !force {
            tracing::info!("{} already exists at {:?}", file.local, dest);
            continue;
        }

        let url = source_url(&source.repo, &file.remote);
        tracing::info!("Downloading {}...", file.local);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        if let Err(e) = download_file(client, &url, &dest).await {
            let _ = std::fs::remove_file(&dest);
            return Err(e);
        }

        let file_size = std::fs::metadata(&dest)?.len();
        tracing::info!(
            "  {} complete ({:.1} MB)",
            file.local,
            file_size as f64 / (1024.0 * 1024.0)
        );
        count += 1;
    }

    Ok(count)
}

fn source_url(repo: &str, remote: &str) -> String {
    format!("https://huggingface.co/{repo}/resolve/main/{remote}")
}

/// Download a file from a URL to a local path, streaming to disk.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }

    file.flush().await?;
    Ok(())
}
