// THEORY:
// Grayscale morphology with a 3x3 square structuring element. Erosion takes the
// neighbourhood minimum, dilation the maximum; running erosion then dilation is a
// morphological opening, which removes specks smaller than the element while
// keeping larger shapes intact. `morph_n` repeats the opening `iterations` times,
// each round consuming the previous round's output.
//
// Like Sobel, only interior pixels are written. The outer ring of every output is
// zero, and because each round reads the previous round's output, that zero ring
// feeds into the next round.

use crate::core_modules::pixel_buffer::{Channel, OPAQUE, PixelBuffer};

fn neighbourhood_fold<F>(input: &PixelBuffer, seed: Channel, pick: F) -> PixelBuffer
where
    F: Fn(Channel, Channel) -> Channel,
{
    let (width, height) = input.dimensions();
    let mut out = input.blank_like();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = seed;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    acc = pick(acc, input.red_at(nx, ny));
                }
            }
            out.put(x, y, [acc, acc, acc, OPAQUE]);
        }
    }
    out
}

pub fn erode(binary: &PixelBuffer) -> PixelBuffer {
    neighbourhood_fold(binary, Channel::MAX, Channel::min)
}

pub fn dilate(binary: &PixelBuffer) -> PixelBuffer {
    neighbourhood_fold(binary, Channel::MIN, Channel::max)
}

/// `iterations` rounds of erode-then-dilate. Zero iterations is the identity.
pub fn morph_n(binary: &PixelBuffer, iterations: u32) -> PixelBuffer {
    let mut current = binary.clone();
    for _ in 0..iterations {
        current = dilate(&erode(&current));
    }
    current
}
