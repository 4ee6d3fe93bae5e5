//! The `image2text batch` command for processing a ZIP archive of images.

use anyhow::Context;
use clap::Args;
use image2text_core::{BatchReport, Config, Image2Text, OutputFormat, OutputWriter};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::types::ReportFormat;
use super::PipelineArgs;

/// Arguments for the `batch` command.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// ZIP archive containing the images
    #[arg(required = true)]
    pub archive: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format (defaults to `output.format` in the config)
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Number of images processed concurrently
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Caption with the decoding flags below instead of the configured defaults
    #[arg(long)]
    pub inherit_params: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Execute the batch command.
pub async fn execute(args: BatchArgs, mut config: Config) -> anyhow::Result<()> {
    let options = args.pipeline.to_options(&config);
    options.validate()?;

    if let Some(parallel) = args.parallel {
        anyhow::ensure!(parallel > 0, "--parallel must be at least 1");
        config.batch.parallel_workers = parallel;
    }
    if args.inherit_params {
        config.batch.inherit_generation_params = true;
    }
    let format = resolve_format(args.format, &config)?;
    let pretty = config.output.pretty;

    let archive = tokio::fs::read(&args.archive)
        .await
        .with_context(|| format!("Cannot read archive {}", args.archive.display()))?;

    let app = Image2Text::new(config);
    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        create_progress_bar()?
    };

    let report = app
        .batch()
        .run_with_progress(archive, &options, |completed, total, record| {
            progress.set_length(total as u64);
            progress.set_position(completed as u64);
            progress.set_message(record.file().to_string());
        })
        .await;
    progress.finish_and_clear();
    let report = report?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create {}", path.display()))?;
            write_report(BufWriter::new(file), format, pretty, &report)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => write_report(std::io::stdout().lock(), format, pretty, &report)?,
    }

    print_summary(&report);
    Ok(())
}

/// The `--format` flag wins; otherwise the config's default format.
fn resolve_format(flag: Option<ReportFormat>, config: &Config) -> anyhow::Result<OutputFormat> {
    match flag {
        Some(format) => Ok(format.into()),
        None => OutputFormat::parse(&config.output.format).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown output.format {:?} in config (expected csv, json or jsonl)",
                config.output.format
            )
        }),
    }
}

fn write_report<W: Write>(
    writer: W,
    format: OutputFormat,
    pretty: bool,
    report: &BatchReport,
) -> anyhow::Result<()> {
    let mut writer = OutputWriter::new(writer, format, pretty);
    writer.write_records(&report.records)?;
    writer.flush()?;
    Ok(())
}

fn create_progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("##-"),
    );
    pb.set_message("extracting...");
    Ok(pb)
}

/// Print a formatted summary table after batch processing.
fn print_summary(report: &BatchReport) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", report.succeeded);
    if report.nsfw_blocked > 0 {
        eprintln!("    NSFW blocked: {:>8}", report.nsfw_blocked);
    }
    if report.failed > 0 {
        eprintln!("    Failed:       {:>8}", report.failed);
    }
    if report.toxic_flagged > 0 {
        eprintln!("    Toxic:        {:>8}", report.toxic_flagged);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", report.total());
    eprintln!("    Duration:     {:>7.1}s", report.elapsed_secs);
    eprintln!("    Rate:         {:>7.1} img/sec", report.rate());
    eprintln!("  ====================================");
}
