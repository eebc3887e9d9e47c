//! Deterministic image characterization.
//!
//! - **tone**: brightness key and contrast range from a luminance histogram
//! - **color**: single representative color via palette quantization
//! - **quantize**: median-cut palette reduction used by `color`
//!
//! Both analyzers are infallible at their public surface: any failure is
//! logged and mapped to a neutral fallback value.

pub mod color;
pub mod quantize;
pub mod tone;

pub use color::ColorAnalyzer;
pub use tone::{Tone, ToneAnalyzer, ToneKey, ToneRange};

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::PipelineError;

/// Decode an image from disk, detecting the format from its content.
pub(crate) fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {e}"),
        })?;
    reader.decode().map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Shrink so the longer edge is at most `max_edge`, keeping the aspect ratio.
///
/// Images already within bounds are returned unchanged (never upscaled).
pub(crate) fn shrink_to_fit(image: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_edge && height <= max_edge {
        return image;
    }
    image.thumbnail(max_edge, max_edge)
}
