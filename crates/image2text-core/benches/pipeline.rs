//! Benchmarks for the text stages and image decoding.
//!
//! Run with: cargo bench -p image2text-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, RgbImage};
use image2text_core::config::{LimitsConfig, ModerationConfig, SeoConfig};
use image2text_core::pipeline::ImageDecoder;
use image2text_core::{ContentModerator, SeoExtractor};
use std::io::Cursor;
use std::path::Path;

const CAPTION: &str = "a beautiful modern kitchen with white cabinets and a large \
    wooden island in the middle of the room next to a bright window. the kitchen \
    has stainless steel appliances";

fn benchmark_seo_extract(c: &mut Criterion) {
    let extractor = SeoExtractor::new(SeoConfig::default(), None);

    c.bench_function("seo_extract", |b| {
        b.iter(|| {
            let _ = extractor.extract(black_box(CAPTION), 5);
        })
    });
}

fn benchmark_seo_fallback(c: &mut Criterion) {
    let config = SeoConfig {
        token_pattern: "([a-z".to_string(),
        ..SeoConfig::default()
    };
    let extractor = SeoExtractor::new(config, None);

    c.bench_function("seo_extract_fallback", |b| {
        b.iter(|| {
            let _ = extractor.extract(black_box(CAPTION), 5);
        })
    });
}

fn benchmark_moderation(c: &mut Criterion) {
    let moderator = ContentModerator::new(ModerationConfig::default());

    c.bench_function("moderate_caption", |b| {
        b.iter(|| {
            let _ = moderator.moderate(black_box(CAPTION));
        })
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(640, 480))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    let bytes = bytes.into_inner();

    let decoder = ImageDecoder::new(LimitsConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("decode_png_640x480", |b| {
        b.iter(|| {
            let _ = rt.block_on(
                decoder.decode_from_bytes(black_box(bytes.clone()), Path::new("bench.png")),
            );
        })
    });
}

criterion_group!(
    benches,
    benchmark_seo_extract,
    benchmark_seo_fallback,
    benchmark_moderation,
    benchmark_decode,
);
criterion_main!(benches);
