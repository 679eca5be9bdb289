// THEORY (Colour Space Conversion):
// Per-pixel conversions from 8-bit sRGB into three alternative colour spaces, and the
// re-quantisation that packs each result back into a displayable RGBA buffer. Every
// conversion here is single-pixel scope: no neighbours, no history.
//
// - HSV:   six-sector hue on normalised sRGB. Hue [0, 360) is stretched to [0, 255];
//          saturation and value [0, 1] are stretched to [0, 255].
// - YCbCr: ITU-R BT.601 full range. Already byte-scaled, only clamped.
// - LAB:   sRGB → linear (gamma decode via a 256-entry `OnceLock` LUT) → XYZ (D65)
//          → CIE L*a*b*. L [0, 100] and a/b [-128, 127] are remapped to [0, 255].
//
// Undefined cases are pinned down explicitly rather than left to produce NaN: a grey
// pixel (max == min) has hue 0, and black has saturation 0.

use crate::core_modules::pixel_buffer::{OPAQUE, PixelBuffer, Rgba, quantize};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub type Hue = f32;
pub type Unit = f32;

// D65 reference white.
const WHITE_X: f32 = 0.95047;
const WHITE_Y: f32 = 1.0;
const WHITE_Z: f32 = 1.08883;

const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA_SLOPE: f32 = 7.787;

static SRGB_TO_LINEAR_LUT: OnceLock<[f32; 256]> = OnceLock::new();

/// Target space for [`convert`]. `Rgb` is the identity copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    Rgb,
    Hsv,
    YCbCr,
    Lab,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Degrees in [0, 360).
    pub h: Hue,
    pub s: Unit,
    pub v: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YCbCr {
    pub y: f32,
    pub cb: f32,
    pub cr: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// sRGB byte → linear light in [0, 1].
#[inline]
pub fn srgb_to_linear(value: u8) -> f32 {
    let table = SRGB_TO_LINEAR_LUT.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            *slot = if normalized > 0.04045 {
                ((normalized + 0.055) / 1.055).powf(2.4)
            } else {
                normalized / 12.92
            };
        }
        table
    });
    table[value as usize]
}

pub fn rgb_to_hsv(red: u8, green: u8, blue: u8) -> Hsv {
    let r = red as f32 / 255.0;
    let g = green as f32 / 255.0;
    let b = blue as f32 / 255.0;

    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let chroma = max - min;

    let s = if max == 0.0 { 0.0 } else { chroma / max };

    let h = if chroma == 0.0 {
        0.0
    } else if max == r {
        let sector = if g < b { 6.0 } else { 0.0 };
        ((g - b) / chroma + sector) * 60.0
    } else if max == g {
        ((b - r) / chroma + 2.0) * 60.0
    } else {
        ((r - g) / chroma + 4.0) * 60.0
    };

    Hsv { h, s, v: max }
}

pub fn rgb_to_ycbcr(red: u8, green: u8, blue: u8) -> YCbCr {
    let (r, g, b) = (red as f32, green as f32, blue as f32);
    YCbCr {
        y: 0.299 * r + 0.587 * g + 0.114 * b,
        cb: -0.168736 * r - 0.331264 * g + 0.5 * b + 128.0,
        cr: 0.5 * r - 0.418688 * g - 0.081312 * b + 128.0,
    }
}

pub fn rgb_to_xyz(red: u8, green: u8, blue: u8) -> Xyz {
    let r = srgb_to_linear(red);
    let g = srgb_to_linear(green);
    let b = srgb_to_linear(blue);
    Xyz {
        x: 0.4124564 * r + 0.3575761 * g + 0.1804375 * b,
        y: 0.2126729 * r + 0.7151522 * g + 0.0721750 * b,
        z: 0.0193339 * r + 0.1191920 * g + 0.9503041 * b,
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        LAB_KAPPA_SLOPE * t + 16.0 / 116.0
    }
}

pub fn rgb_to_lab(red: u8, green: u8, blue: u8) -> Lab {
    let xyz = rgb_to_xyz(red, green, blue);
    let fx = lab_f(xyz.x / WHITE_X);
    let fy = lab_f(xyz.y / WHITE_Y);
    let fz = lab_f(xyz.z / WHITE_Z);
    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Linear remap of `value` from `[from_low, from_high]` onto `[0, 255]`.
#[inline]
fn to_byte_range(value: f32, from_low: f32, from_high: f32) -> f32 {
    (value - from_low) * 255.0 / (from_high - from_low)
}

impl Hsv {
    pub fn to_rgba(self) -> Rgba {
        [
            quantize(to_byte_range(self.h, 0.0, 360.0)),
            quantize(self.s * 255.0),
            quantize(self.v * 255.0),
            OPAQUE,
        ]
    }
}

impl YCbCr {
    pub fn to_rgba(self) -> Rgba {
        [quantize(self.y), quantize(self.cb), quantize(self.cr), OPAQUE]
    }
}

impl Lab {
    pub fn to_rgba(self) -> Rgba {
        [
            quantize(to_byte_range(self.l, 0.0, 100.0)),
            quantize(to_byte_range(self.a, -128.0, 127.0)),
            quantize(to_byte_range(self.b, -128.0, 127.0)),
            OPAQUE,
        ]
    }
}

/// Re-encodes every pixel in `space`. Alpha becomes opaque except for the identity
/// copy, which keeps the source alpha.
pub fn convert(buffer: &PixelBuffer, space: ColorSpace) -> PixelBuffer {
    match space {
        ColorSpace::Rgb => buffer.clone(),
        ColorSpace::Hsv => buffer.map_pixels(|[r, g, b, _]| rgb_to_hsv(r, g, b).to_rgba()),
        ColorSpace::YCbCr => buffer.map_pixels(|[r, g, b, _]| rgb_to_ycbcr(r, g, b).to_rgba()),
        ColorSpace::Lab => buffer.map_pixels(|[r, g, b, _]| rgb_to_lab(r, g, b).to_rgba()),
    }
}
