//! Median-cut palette quantization.
//!
//! Starts from one box holding every pixel and repeatedly splits the box with
//! the widest channel spread near the median of that channel, until the palette
//! size is reached or no box can be split further. Each box becomes one
//! palette entry whose color is the mean of its pixels.

/// One quantized color cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub rgb: [u8; 3],
    pub count: u64,
}

struct ColorBox {
    pixels: Vec<[u8; 3]>,
}

impl ColorBox {
    /// The channel with the largest value spread, and that spread.
    fn widest_channel(&self) -> (usize, u8) {
        let mut min = [u8::MAX; 3];
        let mut max = [u8::MIN; 3];
        for px in &self.pixels {
            for c in 0..3 {
                min[c] = min[c].min(px[c]);
                max[c] = max[c].max(px[c]);
            }
        }
        (0..3)
            .map(|c| (c, max[c].saturating_sub(min[c])))
            .max_by_key(|&(c, spread)| (spread, std::cmp::Reverse(c)))
            .unwrap_or((0, 0))
    }

    fn can_split(&self) -> bool {
        self.pixels.len() > 1 && self.widest_channel().1 > 0
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.pixels.sort_unstable_by_key(|px| px[channel]);
        // Cut at the median, moved to a value boundary so identical levels stay together.
        let pivot = self.pixels[self.pixels.len() / 2][channel];
        let mut at = self.pixels.partition_point(|px| px[channel] < pivot);
        if at == 0 {
            at = self.pixels.partition_point(|px| px[channel] <= pivot);
        }
        let upper = self.pixels.split_off(at);
        (self, ColorBox { pixels: upper })
    }

    fn entry(&self) -> PaletteEntry {
        let count = self.pixels.len() as u64;
        let mut sums = [0u64; 3];
        for px in &self.pixels {
            for c in 0..3 {
                sums[c] += px[c] as u64;
            }
        }
        let mean = |sum: u64| ((sum + count / 2) / count.max(1)) as u8;
        PaletteEntry {
            rgb: [mean(sums[0]), mean(sums[1]), mean(sums[2])],
            count,
        }
    }
}

/// Reduce `pixels` to at most `max_colors` clusters, ordered by pixel count
/// (largest first).
pub fn median_cut(pixels: &[[u8; 3]], max_colors: usize) -> Vec<PaletteEntry> {
    if pixels.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let mut boxes = vec![ColorBox {
        pixels: pixels.to_vec(),
    }];

    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.can_split())
            .max_by_key(|(_, b)| (b.widest_channel().1, b.pixels.len()))
            .map(|(idx, _)| idx);
        let Some(idx) = candidate else {
            break;
        };
        let (lower, upper) = boxes.swap_remove(idx).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    let mut palette: Vec<PaletteEntry> = boxes.iter().map(ColorBox::entry).collect();
    palette.sort_by(|a, b| b.count.cmp(&a.count));
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_is_one_cluster() {
        let pixels = vec![[255, 0, 0]; 100];
        let palette = median_cut(&pixels, 5);
        assert_eq!(
            palette,
            vec![PaletteEntry {
                rgb: [255, 0, 0],
                count: 100
            }]
        );
    }

    #[test]
    fn test_two_colors_separate() {
        let mut pixels = vec![[0, 0, 255]; 30];
        pixels.extend(vec![[200, 200, 200]; 70]);
        let palette = median_cut(&pixels, 5);

        assert_eq!(
            palette,
            vec![
                PaletteEntry {
                    rgb: [200, 200, 200],
                    count: 70
                },
                PaletteEntry {
                    rgb: [0, 0, 255],
                    count: 30
                },
            ]
        );
    }

    #[test]
    fn test_palette_size_is_capped() {
        let pixels: Vec<[u8; 3]> = (0..=255u8).map(|v| [v, 255 - v, v / 2]).collect();
        let palette = median_cut(&pixels, 5);
        assert_eq!(palette.len(), 5);
        assert_eq!(palette.iter().map(|e| e.count).sum::<u64>(), 256);
    }

    #[test]
    fn test_empty_input() {
        assert!(median_cut(&[], 5).is_empty());
    }
}
