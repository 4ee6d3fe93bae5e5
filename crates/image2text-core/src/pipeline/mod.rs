//! Image pipeline stages.
//!
//! - **decode**: Load and decode images with size, dimension and time limits
//! - **analyze**: Run one image through safety, caption, moderation and SEO

pub mod analyze;
pub mod decode;

pub use analyze::{Analyzer, ImageAnalysis};
pub use decode::{DecodedImage, ImageDecoder};
