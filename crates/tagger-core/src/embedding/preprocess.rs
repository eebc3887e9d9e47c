//! Image preprocessing for the CLIP vision tower.
//!
//! CLIP ViT-B/32 expects:
//! - Shortest side resized to 224 (bicubic), then a 224×224 center crop
//! - Channel order: RGB
//! - Normalization: (pixel/255 - mean) / std with the OpenAI CLIP statistics
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// Square input edge of the vision tower.
pub const IMAGE_SIZE: u32 = 224;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Resize so the shorter side equals `size`, then crop the center square.
fn resize_and_crop(image: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let scale = size as f64 / width.min(height) as f64;
    let new_w = ((width as f64 * scale).round() as u32).max(size);
    let new_h = ((height as f64 * scale).round() as u32).max(size);

    let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom);
    let left = (new_w - size) / 2;
    let top = (new_h - size) / 2;
    resized.crop_imm(left, top, size, size)
}

/// Preprocess an image for CLIP inference.
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let rgb = resize_and_crop(image, IMAGE_SIZE).to_rgb8();
    let size = IMAGE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..CHANNELS {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    tensor
}

/// Normalized tensor of an all-black image, fed to the vision input when only
/// text is being encoded.
pub fn blank() -> Array4<f32> {
    let size = IMAGE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));
    for c in 0..CHANNELS {
        tensor
            .slice_mut(ndarray::s![0, c, .., ..])
            .fill(-CLIP_MEAN[c] / CLIP_STD[c]);
    }
    tensor
}
