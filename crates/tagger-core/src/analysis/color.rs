//! Dominant color extraction.
//!
//! The image is flattened onto white, shrunk, and quantized into a small
//! palette. Each cluster is scored by how much of the image it covers, boosted
//! for saturation and brightness, so a vivid accent can beat a large dull
//! background. Near-black and near-white/gray clusters are penalized.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::config::AnalysisConfig;
use crate::error::PipelineError;

use super::quantize::{median_cut, PaletteEntry};
use super::{load_image, shrink_to_fit};

/// Reported when no color can be extracted.
pub const FALLBACK_COLOR: &str = "#808080";

const SATURATION_BOOST: f64 = 1.5;
const VALUE_BOOST: f64 = 1.2;
const DARK_VALUE: f64 = 0.2;
const DARK_PENALTY: f64 = 0.1;
const DULL_SATURATION: f64 = 0.1;
const BRIGHT_VALUE: f64 = 0.8;
const DULL_PENALTY: f64 = 0.5;

/// Hue, saturation and value, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let v = max;
        if max == min {
            return Self { h: 0.0, s: 0.0, v };
        }
        let delta = max - min;
        let s = delta / max;
        let rc = (max - r) / delta;
        let gc = (max - g) / delta;
        let bc = (max - b) / delta;
        let h = if r == max {
            bc - gc
        } else if g == max {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        Self {
            h: (h / 6.0).rem_euclid(1.0),
            s,
            v,
        }
    }
}

/// Perceptual score of a cluster covering `dominance` of the image.
pub fn score(dominance: f64, hsv: Hsv) -> f64 {
    let mut score = dominance * (1.0 + hsv.s * SATURATION_BOOST) * (1.0 + hsv.v * VALUE_BOOST);
    if hsv.v < DARK_VALUE {
        score *= DARK_PENALTY;
    }
    if hsv.s < DULL_SATURATION && hsv.v > BRIGHT_VALUE {
        score *= DULL_PENALTY;
    }
    score
}

/// Pick the best-scoring entry. Ties keep the earlier (larger) cluster.
pub fn select(palette: &[PaletteEntry]) -> Option<[u8; 3]> {
    let total: u64 = palette.iter().map(|e| e.count).sum();
    if total == 0 {
        return None;
    }
    let mut best: Option<([u8; 3], f64)> = None;
    for entry in palette {
        let dominance = entry.count as f64 / total as f64;
        let s = score(dominance, Hsv::from_rgb(entry.rgb));
        if best.map_or(true, |(_, top)| s > top) {
            best = Some((entry.rgb, s));
        }
    }
    best.map(|(rgb, _)| rgb)
}

pub fn to_hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Composite onto opaque white if the image carries transparency.
fn flatten_on_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }
    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }
    out
}

/// Extracts a single representative color from an image.
pub struct ColorAnalyzer {
    max_edge: u32,
    palette_size: usize,
}

impl ColorAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            max_edge: config.max_edge,
            palette_size: config.palette_size,
        }
    }

    /// Return the dominant color as `#rrggbb`, or `#808080` on any failure.
    pub fn dominant_color(&self, path: &Path) -> String {
        match self.analyze(path) {
            Ok(Some(rgb)) => to_hex(rgb),
            Ok(None) => FALLBACK_COLOR.to_string(),
            Err(e) => {
                tracing::warn!("dominant_color error: {e}");
                FALLBACK_COLOR.to_string()
            }
        }
    }

    fn analyze(&self, path: &Path) -> Result<Option<[u8; 3]>, PipelineError> {
        let image = load_image(path)?;
        let flat = DynamicImage::ImageRgb8(flatten_on_white(image));
        let small = shrink_to_fit(flat, self.max_edge).into_rgb8();
        let pixels: Vec<[u8; 3]> = small.pixels().map(|p| p.0).collect();
        let palette = median_cut(&pixels, self.palette_size);
        tracing::trace!("palette for {}: {:?}", path.display(), palette);
        Ok(select(&palette))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn analyzer() -> ColorAnalyzer {
        ColorAnalyzer::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_hsv_conversion() {
        let red = Hsv::from_rgb([255, 0, 0]);
        assert_eq!((red.h, red.s, red.v), (0.0, 1.0, 1.0));

        let gray = Hsv::from_rgb([128, 128, 128]);
        assert_eq!(gray.s, 0.0);
        assert!((gray.v - 128.0 / 255.0).abs() < 1e-9);

        let blue = Hsv::from_rgb([0, 0, 255]);
        assert!((blue.h - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_monotonic_in_saturation() {
        for v in [0.1, 0.5, 0.85, 1.0] {
            let mut previous = f64::NEG_INFINITY;
            for step in 0..=20 {
                let s = step as f64 / 20.0;
                let current = score(0.3, Hsv { h: 0.0, s, v });
                assert!(current >= previous, "s={s} v={v}");
                previous = current;
            }
        }
    }

    #[test]
    fn test_dark_cluster_scores_below_brighter_twin() {
        for step in 0..=10 {
            let s = step as f64 / 10.0;
            let dark = score(0.5, Hsv { h: 0.0, s, v: 0.19 });
            for v in [0.2, 0.5, 0.81, 1.0] {
                let lit = score(0.5, Hsv { h: 0.0, s, v });
                assert!(dark < lit, "s={s} v={v}");
            }
        }
    }

    #[test]
    fn test_vivid_minority_beats_dull_majority() {
        let palette = [
            PaletteEntry {
                rgb: [128, 128, 128],
                count: 70,
            },
            PaletteEntry {
                rgb: [0, 0, 255],
                count: 30,
            },
        ];
        assert_eq!(select(&palette), Some([0, 0, 255]));
    }

    #[test]
    fn test_overwhelming_black_still_wins() {
        let palette = [
            PaletteEntry {
                rgb: [5, 5, 5],
                count: 98,
            },
            PaletteEntry {
                rgb: [120, 120, 120],
                count: 2,
            },
        ];
        assert_eq!(select(&palette), Some([5, 5, 5]));
    }

    #[test]
    fn test_hex_is_lowercase() {
        assert_eq!(to_hex([0xAB, 0x0C, 0xFF]), "#ab0cff");
    }

    #[test]
    fn test_pure_red_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        assert_eq!(analyzer().dominant_color(&path), "#ff0000");
    }

    #[test]
    fn test_transparent_pixels_read_as_white() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clear.png");
        RgbaImage::from_pixel(20, 20, Rgba([10, 200, 30, 0]))
            .save(&path)
            .unwrap();

        assert_eq!(analyzer().dominant_color(&path), "#ffffff");
    }

    #[test]
    fn test_large_image_is_downscaled_and_analyzed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::from_pixel(800, 400, Rgb([0, 160, 80]))
            .save(&path)
            .unwrap();

        let hex = analyzer().dominant_color(&path);
        let channel = |i: usize| i32::from_str_radix(&hex[i..i + 2], 16).unwrap();
        assert!(channel(1) <= 2, "{hex}");
        assert!((channel(3) - 160).abs() <= 2, "{hex}");
        assert!((channel(5) - 80).abs() <= 2, "{hex}");
    }

    #[test]
    fn test_corrupt_file_falls_back_to_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0x00, 0x01]).unwrap();

        assert_eq!(analyzer().dominant_color(&path), FALLBACK_COLOR);
    }
}
