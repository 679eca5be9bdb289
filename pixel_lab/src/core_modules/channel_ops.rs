// THEORY:
// Channel operations are the cheapest transforms in the system: each output pixel
// depends only on the matching input pixel. They provide the grayscale inputs that
// the neighbourhood algorithms (Sobel, morphology, Otsu) expect, plus the colour
// channel and threshold views.
//
// Grayscale here is the plain channel mean `(r + g + b) / 3`, not a luma weighting.
// Thresholding compares the raw channel *sum* against the threshold, regardless of
// what the channels encode; it is reused unchanged on RGB, HSV and YCbCr images.

use crate::core_modules::pixel_buffer::{OPAQUE, PixelBuffer, quantize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

#[inline]
fn channel_mean(r: u8, g: u8, b: u8) -> f32 {
    (r as f32 + g as f32 + b as f32) / 3.0
}

/// Gray level scaled by `scale`, written to R, G and B. Alpha is kept.
pub fn grayscale_brighten(buffer: &PixelBuffer, scale: f32) -> PixelBuffer {
    buffer.map_pixels(|[r, g, b, a]| {
        let gray = quantize(channel_mean(r, g, b) * scale);
        [gray, gray, gray, a]
    })
}

pub fn to_grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    grayscale_brighten(buffer, 1.0)
}

/// Keeps one colour channel and zeroes the other two. Alpha is kept.
pub fn extract_channel(buffer: &PixelBuffer, which: ColorChannel) -> PixelBuffer {
    buffer.map_pixels(|[r, g, b, a]| match which {
        ColorChannel::Red => [r, 0, 0, a],
        ColorChannel::Green => [0, g, 0, a],
        ColorChannel::Blue => [0, 0, b, a],
    })
}

/// Pixels whose `r + g + b` exceeds `threshold` keep their colour; the rest turn
/// black. Output is always opaque.
pub fn threshold_by_sum(buffer: &PixelBuffer, threshold: u32) -> PixelBuffer {
    buffer.map_pixels(|[r, g, b, _]| {
        let sum = r as u32 + g as u32 + b as u32;
        if sum > threshold {
            [r, g, b, OPAQUE]
        } else {
            [0, 0, 0, OPAQUE]
        }
    })
}
