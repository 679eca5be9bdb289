// THEORY:
// Sobel gradient magnitude over a grayscale image. The two 3x3 kernels approximate
// the horizontal and vertical derivatives; their Euclidean norm is the edge
// strength. Only the red channel is read since grayscale inputs carry the same
// value in R, G and B.
//
// The kernel needs a full neighbourhood, so the outermost ring of the output is
// never written and keeps the zeroed (transparent black) initial value.

use crate::core_modules::pixel_buffer::{OPAQUE, PixelBuffer, quantize};

pub type Kernel3 = [[i32; 3]; 3];

pub const SOBEL_X: Kernel3 = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
pub const SOBEL_Y: Kernel3 = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Applies `kernel` centred on the interior pixel `(x, y)`, reading the red channel.
#[inline]
fn correlate(buffer: &PixelBuffer, kernel: &Kernel3, x: u32, y: u32) -> i32 {
    let mut sum = 0;
    for (ky, row) in kernel.iter().enumerate() {
        for (kx, weight) in row.iter().enumerate() {
            let value = buffer.red_at(x + kx as u32 - 1, y + ky as u32 - 1) as i32;
            sum += value * weight;
        }
    }
    sum
}

pub fn sobel(gray: &PixelBuffer) -> PixelBuffer {
    let (width, height) = gray.dimensions();
    let mut out = gray.blank_like();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = correlate(gray, &SOBEL_X, x, y) as f32;
            let gy = correlate(gray, &SOBEL_Y, x, y) as f32;
            let magnitude = quantize((gx * gx + gy * gy).sqrt());
            out.put(x, y, [magnitude, magnitude, magnitude, OPAQUE]);
        }
    }
    out
}
