//! Tonal classification from a luminance histogram.
//!
//! The result is `"<key>-<range>"`:
//! - key (brightness): `high`, `mid` or `low`, from the share of pixels in the
//!   shadow (0-85) and highlight (171-255) bands plus the mean luminance
//! - range (contrast): `short`, `mid` or `long`, from the spread between the
//!   5th and 95th percentile luminance levels

use std::fmt;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};

use crate::config::AnalysisConfig;
use crate::error::PipelineError;

use super::{load_image, shrink_to_fit};

/// Upper bound (inclusive) of the shadow band.
const SHADOW_MAX: usize = 85;

/// Lower bound (inclusive) of the highlight band.
const HIGHLIGHT_MIN: usize = 171;

/// Band share above which an image is considered high or low key.
const BAND_THRESHOLD: f64 = 0.6;

const HIGH_KEY_MEAN: f64 = 180.0;
const LOW_KEY_MEAN: f64 = 75.0;

const SHORT_RANGE_BELOW: usize = 100;
const LONG_RANGE_ABOVE: usize = 190;

/// Overall brightness of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneKey {
    High,
    Mid,
    Low,
}

/// Spread of luminance levels, a contrast proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneRange {
    Short,
    Mid,
    Long,
}

/// Combined tonal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub key: ToneKey,
    pub range: ToneRange,
}

impl Tone {
    /// Value reported when an image cannot be analyzed.
    pub const FALLBACK: Tone = Tone {
        key: ToneKey::Mid,
        range: ToneRange::Mid,
    };
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            ToneKey::High => "high",
            ToneKey::Mid => "mid",
            ToneKey::Low => "low",
        };
        let range = match self.range {
            ToneRange::Short => "short",
            ToneRange::Mid => "mid",
            ToneRange::Long => "long",
        };
        write!(f, "{key}-{range}")
    }
}

/// 256-bin luminance histogram.
#[derive(Debug, Clone)]
pub struct LuminanceHistogram {
    bins: [u64; 256],
}

impl LuminanceHistogram {
    pub fn from_bins(bins: [u64; 256]) -> Self {
        Self { bins }
    }

    pub fn from_image(image: &GrayImage) -> Self {
        let mut bins = [0u64; 256];
        for Luma([level]) in image.pixels() {
            bins[*level as usize] += 1;
        }
        Self { bins }
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Classify key and range. Returns `None` for an empty histogram.
    pub fn classify(&self) -> Option<Tone> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let total_f = total as f64;

        let shadow: u64 = self.bins[..=SHADOW_MAX].iter().sum();
        let highlight: u64 = self.bins[HIGHLIGHT_MIN..].iter().sum();
        let p_shadow = shadow as f64 / total_f;
        let p_highlight = highlight as f64 / total_f;

        let weighted: u64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(level, &count)| level as u64 * count)
            .sum();
        let mean = weighted as f64 / total_f;

        let key = if p_highlight > BAND_THRESHOLD || mean > HIGH_KEY_MEAN {
            ToneKey::High
        } else if p_shadow > BAND_THRESHOLD || mean < LOW_KEY_MEAN {
            ToneKey::Low
        } else {
            ToneKey::Mid
        };

        let (p5, p95) = self.percentiles(total_f);
        let spread = p95.saturating_sub(p5);
        let range = if spread < SHORT_RANGE_BELOW {
            ToneRange::Short
        } else if spread > LONG_RANGE_ABOVE {
            ToneRange::Long
        } else {
            ToneRange::Mid
        };

        Some(Tone { key, range })
    }

    /// 5th and 95th percentile levels from the cumulative distribution.
    ///
    /// p5 falls back to 0 and p95 to 255 when the threshold is never reached.
    fn percentiles(&self, total: f64) -> (usize, usize) {
        let mut cumulative = 0u64;
        let mut p5 = None;
        let mut p95 = 255;
        for (level, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            let fraction = cumulative as f64 / total;
            if p5.is_none() && fraction >= 0.05 {
                p5 = Some(level);
            }
            if fraction >= 0.95 {
                p95 = level;
                break;
            }
        }
        (p5.unwrap_or(0), p95)
    }
}

/// ITU-R 601-2 luma, matching the common 8-bit "L" conversion.
pub fn to_luminance(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in rgb.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        *dst = Luma([l as u8]);
    }
    gray
}

/// Classifies an image's tonal key and range.
pub struct ToneAnalyzer {
    max_edge: u32,
}

impl ToneAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            max_edge: config.max_edge,
        }
    }

    /// Return `"<key>-<range>"`, or `"mid-mid"` if the image cannot be analyzed.
    pub fn calculate_tone(&self, path: &Path) -> String {
        match self.analyze(path) {
            Ok(tone) => tone.to_string(),
            Err(e) => {
                tracing::warn!("calculate_tone error: {e}");
                Tone::FALLBACK.to_string()
            }
        }
    }

    fn analyze(&self, path: &Path) -> Result<Tone, PipelineError> {
        let image = load_image(path)?;
        let luma = DynamicImage::ImageLuma8(to_luminance(&image));
        let small = shrink_to_fit(luma, self.max_edge).into_luma8();
        let histogram = LuminanceHistogram::from_image(&small);
        Ok(histogram.classify().unwrap_or(Tone::FALLBACK))
    }
}
