//! Image preprocessing shared by the vision models.
//!
//! Both the captioning vision encoder and the safety classifier expect:
//! - a square input (384×384 for BLIP, 224×224 for the ViT classifier)
//! - pixels rescaled to [0, 1] then normalized per channel: (x - mean) / std
//! - RGB channel order
//! - NCHW tensor layout [batch, channels, height, width]

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Per-model normalization settings.
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub filter: FilterType,
}

/// Resize, convert to RGB, normalize, and lay out as an NCHW tensor.
pub fn preprocess(image: &DynamicImage, norm: &Normalization) -> Array4<f32> {
    let resized = image.resize_exact(norm.image_size, norm.image_size, norm.filter);
    let rgb = resized.to_rgb8();

    let size = norm.image_size as usize;
    let plane = size * size;
    let mut data = vec![0f32; CHANNELS * plane];

    // Walk the raw RGB bytes once; NCHW offset = c * plane + y * size + x.
    for (i, pixel) in rgb.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * plane + i] = (val as f32 / 255.0 - norm.mean[c]) / norm.std[c];
        }
    }

    Array4::from_shape_vec((1, CHANNELS, size, size), data)
        .unwrap_or_else(|_| Array4::zeros((1, CHANNELS, size, size)))
}
