//! End-to-end batch runs over in-memory ZIP archives with fake models.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use image2text_core::models::{CaptionModel, ImageClassifier, Prediction, TextEmbedder};
use image2text_core::{
    Config, GenerationParams, Image2Text, ItemStatus, ModelLoader, ModelTier, OutputFormat,
    OutputWriter, PipelineError, ProcessingOptions,
};

/// Captions by image width so each row is distinguishable.
struct WidthCaptioner {
    counters: Counters,
}

impl CaptionModel for WidthCaptioner {
    fn caption(
        &self,
        image: &DynamicImage,
        params: &GenerationParams,
    ) -> Result<String, PipelineError> {
        self.counters.beams.store(params.num_beams, Ordering::SeqCst);
        let (width, _) = image.dimensions();
        if width == 13 {
            return Err(PipelineError::Model {
                message: "decoder produced NaN logits".to_string(),
            });
        }
        self.counters.captioned.fetch_add(1, Ordering::SeqCst);
        Ok(format!(" a beautiful mountain landscape {width} pixels wide "))
    }
}

/// Red-dominant images are "nsfw".
struct RedClassifier;

impl ImageClassifier for RedClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Prediction>, PipelineError> {
        let Rgb([r, _, _]) = image.to_rgb8().get_pixel(0, 0).to_owned();
        let nsfw = if r > 200 { 0.97 } else { 0.04 };
        Ok(vec![
            Prediction::new("normal", 1.0 - nsfw),
            Prediction::new("nsfw", nsfw),
        ])
    }
}

struct UnitEmbedder;

impl TextEmbedder for UnitEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(vec![1.0, 0.0])
    }
}

/// What the fake captioner observed: the last beam count and how many
/// captions it has finished.
#[derive(Clone, Default)]
struct Counters {
    beams: Arc<AtomicUsize>,
    captioned: Arc<AtomicUsize>,
}

struct FakeLoader {
    counters: Counters,
}

impl ModelLoader for FakeLoader {
    fn load_captioner(&self, _tier: ModelTier) -> Result<Arc<dyn CaptionModel>, PipelineError> {
        Ok(Arc::new(WidthCaptioner {
            counters: self.counters.clone(),
        }))
    }

    fn load_similarity(&self) -> Result<Arc<dyn TextEmbedder>, PipelineError> {
        Ok(Arc::new(UnitEmbedder))
    }

    fn load_safety(&self) -> Result<Arc<dyn ImageClassifier>, PipelineError> {
        Ok(Arc::new(RedClassifier))
    }
}

fn app(config: Config) -> (Image2Text, Counters) {
    let counters = Counters::default();
    let loader = FakeLoader {
        counters: counters.clone(),
    };
    (Image2Text::with_loader(config, loader), counters)
}

fn encode(width: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 8, Rgb(color)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn zip_of(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(name, options).unwrap();
        writer.write_all(&data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const GREEN: [u8; 3] = [20, 180, 40];
const RED: [u8; 3] = [250, 10, 10];

#[tokio::test]
async fn test_three_valid_one_corrupt() {
    let (app, _) = app(Config::default());
    let archive = zip_of(vec![
        ("a.png", encode(10, GREEN, ImageFormat::Png)),
        ("b.jpg", encode(11, GREEN, ImageFormat::Jpeg)),
        ("c.png", b"\x89PNG but not really".to_vec()),
        ("d.JPEG", encode(12, GREEN, ImageFormat::Jpeg)),
        ("readme.txt", b"ignored".to_vec()),
    ]);

    let report = app
        .batch()
        .run(archive, &ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.nsfw_blocked, 0);

    let files: Vec<&str> = report.records.iter().map(|r| r.file()).collect();
    assert_eq!(files, vec!["a.png", "b.jpg", "c.png", "d.JPEG"]);

    let corrupt = &report.records[2];
    assert!(matches!(corrupt.status(), ItemStatus::Error(_)));
    assert_eq!(corrupt.nsfw_score(), "N/A");
    assert!(corrupt.caption().is_empty());

    let first = &report.records[0];
    assert_eq!(first.caption(), "a beautiful mountain landscape 10 pixels wide");
    assert_eq!(first.nsfw_score(), "4.0%");
    assert!(first.keywords().starts_with("beautiful"));
    assert_eq!(first.meta_description(), first.caption());
}

#[tokio::test]
async fn test_blocked_and_failed_captions() {
    let (app, _) = app(Config::default());
    let archive = zip_of(vec![
        ("1.png", encode(10, RED, ImageFormat::Png)),
        ("2.png", encode(13, GREEN, ImageFormat::Png)),
        ("3.png", encode(14, GREEN, ImageFormat::Png)),
    ]);

    let report = app
        .batch()
        .run(archive, &ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(report.nsfw_blocked, 1);
    let blocked = &report.records[0];
    assert_eq!(blocked.status(), &ItemStatus::BlockedNsfw);
    assert_eq!(blocked.caption(), "[BLOCKED] NSFW content detected");
    assert_eq!(blocked.nsfw_score(), "97.0%");

    let failed = &report.records[1];
    match failed.status() {
        ItemStatus::Error(message) => assert!(message.contains("NaN logits")),
        other => panic!("expected error status, got {other:?}"),
    }
    assert_eq!(report.records[2].status(), &ItemStatus::Success);
}

#[tokio::test]
async fn test_disabled_checks() {
    let (app, _) = app(Config::default());
    let archive = zip_of(vec![("1.png", encode(10, RED, ImageFormat::Png))]);
    let options = ProcessingOptions {
        enable_nsfw_check: false,
        enable_seo: false,
        ..Default::default()
    };

    let report = app.batch().run(archive, &options).await.unwrap();
    let record = &report.records[0];
    assert_eq!(record.status(), &ItemStatus::Success);
    assert_eq!(record.nsfw_score(), "N/A");
    assert_eq!(record.keywords(), "");
    assert_eq!(record.meta_description(), "");
}

#[tokio::test]
async fn test_batch_uses_default_decoding_unless_inherited() {
    let options = ProcessingOptions {
        num_beams: 1,
        ..Default::default()
    };
    let archive = || zip_of(vec![("1.png", encode(10, GREEN, ImageFormat::Png))]);

    let (app_default, counters) = app(Config::default());
    app_default.batch().run(archive(), &options).await.unwrap();
    assert_eq!(counters.beams.load(Ordering::SeqCst), 3);

    let mut config = Config::default();
    config.batch.inherit_generation_params = true;
    let (app_inherit, counters) = app(config);
    app_inherit.batch().run(archive(), &options).await.unwrap();
    assert_eq!(counters.beams.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parallel_workers_keep_walk_order() {
    let mut config = Config::default();
    config.batch.parallel_workers = 4;
    let (app, _) = app(config);

    let entries: Vec<(String, Vec<u8>)> = (0..12)
        .map(|i| (format!("img{i:02}.png"), encode(20 + i, GREEN, ImageFormat::Png)))
        .collect();
    let archive = zip_of(entries.iter().map(|(n, d)| (n.as_str(), d.clone())).collect());

    let mut progress = Vec::new();
    let report = app
        .batch()
        .run_with_progress(archive, &ProcessingOptions::default(), |done, total, _| {
            progress.push((done, total))
        })
        .await
        .unwrap();

    let files: Vec<String> = report.records.iter().map(|r| r.file().to_string()).collect();
    let expected: Vec<String> = (0..12).map(|i| format!("img{i:02}.png")).collect();
    assert_eq!(files, expected);
    assert_eq!(progress.len(), 12);
    assert_eq!(progress.last(), Some(&(12, 12)));
}

#[tokio::test]
async fn test_progress_reported_as_images_complete() {
    let (app, counters) = app(Config::default());
    let names = ["a.png", "b.png", "c.png", "d.png", "e.png"];
    let archive = zip_of(
        names
            .iter()
            .zip(0u32..)
            .map(|(name, i)| (*name, encode(20 + i, GREEN, ImageFormat::Png)))
            .collect(),
    );

    let mut seen = Vec::new();
    app.batch()
        .run_with_progress(archive, &ProcessingOptions::default(), |done, _, _| {
            seen.push((done, counters.captioned.load(Ordering::SeqCst)))
        })
        .await
        .unwrap();

    // One worker: each callback fires before the next image is captioned.
    assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
}

#[tokio::test]
async fn test_corrupt_archive_fails_run() {
    let (app, _) = app(Config::default());
    let result = app
        .batch()
        .run(b"PK\x03\x04 truncated".to_vec(), &ProcessingOptions::default())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_empty_archive_reports_header_only() {
    let (app, _) = app(Config::default());
    let report = app
        .batch()
        .run(zip_of(vec![]), &ProcessingOptions::default())
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    let mut buffer = Vec::new();
    OutputWriter::new(&mut buffer, OutputFormat::Csv, false)
        .write_records(&report.records)
        .unwrap();
    assert_eq!(
        String::from_utf8(buffer).unwrap().trim_end(),
        "File,Caption,Keywords,Meta Description,NSFW Score,Status"
    );
}

#[tokio::test]
async fn test_process_archive_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photos.zip");
    std::fs::write(
        &path,
        zip_of(vec![("only.png", encode(10, GREEN, ImageFormat::Png))]),
    )
    .unwrap();

    let (app, _) = app(Config::default());
    let report = app
        .process_archive(&path, &ProcessingOptions::default())
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
}
