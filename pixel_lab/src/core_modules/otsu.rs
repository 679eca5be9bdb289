// THEORY:
// Otsu's method picks the gray level that best separates an image into a dark
// background class and a bright foreground class, by maximising the between-class
// variance `wB * wF * (meanB - meanF)^2` over every candidate threshold.
//
// The scan is a single pass over a 256-bin histogram with running class weights:
// levels before the first populated bin are skipped (no background yet), and the
// scan stops once the background has absorbed every pixel (no foreground left).
// Strict comparison keeps the lowest maximising level on ties. A flat image never
// produces a valid split and yields 0.

use crate::core_modules::pixel_buffer::{OPAQUE, PixelBuffer};

pub const LEVELS: usize = 256;

/// Pixel counts per gray level, built from the red channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: [u64; LEVELS],
    total: u64,
}

impl Histogram {
    pub fn from_buffer(gray: &PixelBuffer) -> Self {
        let mut bins = [0u64; LEVELS];
        for px in gray.pixels() {
            bins[px[0] as usize] += 1;
        }
        let total = bins.iter().sum();
        Self { bins, total }
    }

    pub fn bins(&self) -> &[u64; LEVELS] {
        &self.bins
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Between-class variance if the image were split so that levels `0..=t` are
    /// background. `None` when either class would be empty.
    pub fn between_class_variance(&self, t: u8) -> Option<f64> {
        let split = t as usize + 1;
        let w_b: u64 = self.bins[..split].iter().sum();
        let w_f = self.total - w_b;
        if w_b == 0 || w_f == 0 {
            return None;
        }
        let sum_b: f64 = weighted_sum(&self.bins[..split], 0);
        let sum_f: f64 = weighted_sum(&self.bins[split..], split);
        let mean_diff = sum_b / w_b as f64 - sum_f / w_f as f64;
        Some(w_b as f64 * w_f as f64 * mean_diff * mean_diff)
    }
}

fn weighted_sum(bins: &[u64], first_level: usize) -> f64 {
    bins.iter()
        .enumerate()
        .map(|(i, &count)| (first_level + i) as f64 * count as f64)
        .sum()
}

pub fn compute_threshold(gray: &PixelBuffer) -> u8 {
    threshold_from_histogram(&Histogram::from_buffer(gray))
}

pub fn threshold_from_histogram(histogram: &Histogram) -> u8 {
    let total = histogram.total as f64;
    let sum = weighted_sum(&histogram.bins, 0);

    let mut sum_b = 0.0;
    let mut w_b = 0.0;
    let mut max_variance = 0.0;
    let mut threshold = 0u8;

    for (level, &count) in histogram.bins.iter().enumerate() {
        w_b += count as f64;
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }

        sum_b += level as f64 * count as f64;
        let mean_b = sum_b / w_b;
        let mean_f = (sum - sum_b) / w_f;
        let variance = w_b * w_f * (mean_b - mean_f) * (mean_b - mean_f);

        if variance > max_variance {
            max_variance = variance;
            threshold = level as u8;
        }
    }

    threshold
}

/// Binary map: 255 where the red channel is at least `t`, 0 otherwise. Opaque.
pub fn apply_threshold(gray: &PixelBuffer, t: u8) -> PixelBuffer {
    gray.map_pixels(|[v, _, _, _]| {
        let bin = if v >= t { 255 } else { 0 };
        [bin, bin, bin, OPAQUE]
    })
}
