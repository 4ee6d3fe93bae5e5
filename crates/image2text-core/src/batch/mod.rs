//! Batch processing of a ZIP archive of images.
//!
//! The archive is extracted into a temporary directory that lives for the
//! duration of the run. Each image then goes through the safety gate, caption
//! generation, moderation and SEO extraction. A failing image becomes an
//! `Error` record and the batch moves on; only an unreadable archive fails the
//! whole run.

mod report;

pub use report::{
    BatchItemRecord, BatchReport, ItemStatus, BLOCKED_CAPTION, COLUMNS, SCORE_NOT_AVAILABLE,
};

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::config::BatchConfig;
use crate::error::{Image2TextError, PipelineError, Result};
use crate::pipeline::Analyzer;
use crate::types::{GenerationParams, ProcessingOptions};

/// Runs the per-image pipeline over every image in an archive.
pub struct BatchOrchestrator {
    analyzer: Analyzer,
    config: BatchConfig,
}

/// What one worker reports back.
struct ItemOutcome {
    record: BatchItemRecord,
    toxic: bool,
}

impl BatchOrchestrator {
    pub fn new(analyzer: Analyzer, config: BatchConfig) -> Self {
        Self { analyzer, config }
    }

    /// Process an archive held in memory.
    pub async fn run(&self, archive: Vec<u8>, options: &ProcessingOptions) -> Result<BatchReport> {
        self.run_with_progress(archive, options, |_, _, _| {}).await
    }

    /// Process an archive on disk.
    pub async fn run_file(&self, path: &Path, options: &ProcessingOptions) -> Result<BatchReport> {
        let archive = tokio::fs::read(path).await.map_err(|e| PipelineError::Archive {
            message: format!("Cannot read {:?}: {e}", path),
        })?;
        self.run(archive, options).await
    }

    /// Process an archive, calling `on_item(completed, total, record)` after
    /// each image.
    pub async fn run_with_progress<F>(
        &self,
        archive: Vec<u8>,
        options: &ProcessingOptions,
        mut on_item: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(usize, usize, &BatchItemRecord),
    {
        let start = Instant::now();
        tracing::info!(
            "Starting batch processing using model: {}",
            options.model_tier
        );

        let extensions = self.config.image_extensions.clone();
        let (workdir, images) =
            tokio::task::spawn_blocking(move || extract_images(archive, &extensions))
                .await
                .map_err(|e| PipelineError::Archive {
                    message: format!("Extraction task failed: {e}"),
                })??;
        tracing::info!("Found {} images in archive", images.len());

        let params = self.generation_params(options);
        let total = images.len();
        let workers = self.config.parallel_workers.max(1);
        let mut in_flight = VecDeque::with_capacity(workers);
        let mut records = Vec::with_capacity(total);
        let mut toxic_flagged = 0usize;

        // At most `workers` images run at once. The oldest handle is awaited
        // before the next spawn, so callbacks fire as work completes and the
        // report stays in walk order.
        let mut finish = |outcome: ItemOutcome| {
            toxic_flagged += usize::from(outcome.toxic);
            on_item(records.len() + 1, total, &outcome.record);
            records.push(outcome.record);
        };

        for path in images {
            if in_flight.len() == workers {
                if let Some((file, handle)) = in_flight.pop_front() {
                    finish(join_outcome(file, handle).await);
                }
            }
            let analyzer = self.analyzer.clone();
            let options = options.clone();
            let file = file_name(&path);
            let handle =
                tokio::spawn(async move { process_image(&analyzer, &path, &options, params).await });
            in_flight.push_back((file, handle));
        }
        while let Some((file, handle)) = in_flight.pop_front() {
            finish(join_outcome(file, handle).await);
        }

        drop(workdir);
        let report = BatchReport::new(records, toxic_flagged, start.elapsed().as_secs_f64());
        if report.nsfw_blocked > 0 {
            tracing::warn!(
                "Blocked {} NSFW images during processing",
                report.nsfw_blocked
            );
        }
        tracing::info!(
            "Batch processing completed: {} succeeded, {} blocked, {} failed",
            report.succeeded,
            report.nsfw_blocked,
            report.failed
        );
        Ok(report)
    }

    /// Batches caption with the configured defaults unless told to honor the
    /// request's decoding fields.
    fn generation_params(&self, options: &ProcessingOptions) -> GenerationParams {
        let captioner = self.analyzer.captioner();
        if self.config.inherit_generation_params {
            captioner.params_for(options)
        } else {
            captioner.default_params()
        }
    }
}

/// Await a worker; a panicked or cancelled task becomes an `Error` record.
async fn join_outcome(file: String, handle: JoinHandle<ItemOutcome>) -> ItemOutcome {
    handle.await.unwrap_or_else(|e| {
        tracing::error!("Error processing image {file}: {e}");
        ItemOutcome {
            record: BatchItemRecord::error(&file, format!("worker task failed: {e}")),
            toxic: false,
        }
    })
}

/// Run one image through the pipeline. Never fails; problems become an
/// `Error` record.
async fn process_image(
    analyzer: &Analyzer,
    path: &Path,
    options: &ProcessingOptions,
    params: GenerationParams,
) -> ItemOutcome {
    let file = file_name(path);
    tracing::info!("Processing image: {file}");
    let error = |message: String| {
        tracing::error!("Error processing image {file}: {message}");
        ItemOutcome {
            record: BatchItemRecord::error(&file, message),
            toxic: false,
        }
    };

    let image = match analyzer.decoder().decode_file(path).await {
        Ok(decoded) => Arc::new(decoded.image),
        Err(e) => return error(e.to_string()),
    };

    let nsfw_score = if options.enable_nsfw_check {
        let verdict = analyzer.check_safety(Arc::clone(&image)).await;
        tracing::debug!(
            "NSFW score for {file}: {:.2} ({})",
            verdict.score,
            verdict.label
        );
        if verdict.is_blocked() {
            tracing::warn!("Image {file} blocked due to NSFW content");
            return ItemOutcome {
                record: BatchItemRecord::blocked(&file, verdict.score),
                toxic: false,
            };
        }
        Some(verdict.score)
    } else {
        None
    };

    let caption = analyzer
        .captioner()
        .generate_with_timeout(image, options.model_tier, params)
        .await;
    if let Some(message) = caption.generation_error() {
        return error(message);
    }
    tracing::info!("Caption generated for {file}: {}", caption.text);

    let toxic = options.enable_moderation && {
        let verdict = analyzer.moderator().moderate(&caption.text);
        if verdict.flagged {
            tracing::warn!(
                "Caption for {file} flagged as toxic ({:.2})",
                verdict.toxicity_score
            );
        }
        verdict.flagged
    };

    let (keywords, meta_description) = if options.enable_seo {
        let seo = analyzer
            .seo()
            .extract(&caption.text, analyzer.seo().max_keywords());
        tracing::debug!(
            "SEO metadata for {file}: {:?}, {}",
            seo.keywords,
            seo.meta_description
        );
        (seo.keywords, seo.meta_description)
    } else {
        (Vec::new(), String::new())
    };

    tracing::info!("Image {file} processed successfully");
    ItemOutcome {
        record: BatchItemRecord::success(
            &file,
            caption.text,
            &keywords,
            meta_description,
            nsfw_score,
        ),
        toxic,
    }
}

/// Extract the archive into a fresh temporary directory and list its images
/// in walk order (sorted by file name at each level).
fn extract_images(archive: Vec<u8>, extensions: &[String]) -> Result<(TempDir, Vec<PathBuf>)> {
    let workdir = tempfile::Builder::new()
        .prefix("image2text-batch-")
        .tempdir()?;
    tracing::info!("Extracting ZIP file to {:?}", workdir.path());

    let archive_error = |e: zip::result::ZipError| {
        Image2TextError::from(PipelineError::Archive {
            message: e.to_string(),
        })
    };
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(archive_error)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = workdir.path().join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out).map_err(|e| PipelineError::Archive {
            message: format!("Cannot extract {}: {e}", entry.name()),
        })?;
    }

    let images = WalkDir::new(workdir.path())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_image_extension(path, extensions))
        .collect();

    Ok((workdir, images))
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn extensions() -> Vec<String> {
        BatchConfig::default().image_extensions
    }

    #[test]
    fn test_extract_filters_and_orders() {
        let archive = zip_of(&[
            ("b.PNG", b"x"),
            ("notes.txt", b"x"),
            ("a.jpg", b"x"),
            ("sub/c.jpeg", b"x"),
        ]);
        let (dir, images) = extract_images(archive, &extensions()).unwrap();
        let names: Vec<String> = images.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
        assert!(images.iter().all(|p| p.starts_with(dir.path())));
    }

    #[test]
    fn test_extract_rejects_corrupt_archive() {
        let err = extract_images(b"not a zip".to_vec(), &extensions())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Archive error"));
    }

    #[test]
    fn test_workdir_removed_on_drop() {
        let (dir, _) = extract_images(zip_of(&[("a.png", b"x")]), &extensions()).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_has_image_extension() {
        let exts = extensions();
        assert!(has_image_extension(Path::new("x/photo.JPG"), &exts));
        assert!(!has_image_extension(Path::new("x/photo.gif"), &exts));
        assert!(!has_image_extension(Path::new("x/README"), &exts));
    }
}
