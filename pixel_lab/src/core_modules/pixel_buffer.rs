// THEORY:
// The `PixelBuffer` is the single currency of the pipeline. Every transform takes
// one by reference and hands back a freshly allocated one; nothing is ever written
// in place, so a buffer can be shared freely between views and worker tasks.
//
// Key architectural principles:
// 1.  **Validated Once**: The shape invariant (`data.len() == width * height * 4`,
//     non-zero dimensions) is checked in the constructor. Fields are private, so a
//     buffer that exists is a buffer that is well-formed, and the transforms
//     downstream can index without re-validating.
// 2.  **Zeroed Allocation**: Fresh outputs start as transparent black. Kernels that
//     skip the outer ring (Sobel, morphology) therefore leave a defined zero border.
// 3.  **Interop**: Conversions to and from `image::RgbaImage` let the `image` crate
//     handle resizing, blurring and file codecs without copying pixel data.

use crate::error::{PipelineError, Result};
use image::RgbaImage;
use image::imageops::{self, FilterType};

pub type Channel = u8;
pub type Rgba = [Channel; 4];

pub const CHANNELS: usize = 4;
pub const OPAQUE: Channel = 255;

/// Rounds a float into the displayable byte range. NaN maps to 0.
#[inline]
pub fn quantize(value: f32) -> Channel {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as Channel
}

/// A flat, row-major RGBA raster with fixed dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<Channel>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<Channel>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != Self::byte_len(width, height) {
            return Err(PipelineError::InvalidBuffer {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A transparent-black buffer of the given size.
    pub fn zeroed(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, vec![0; Self::byte_len(width, height)])
    }

    /// A buffer where every pixel is `color`.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self> {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self::new(width, height, data)
    }

    /// Zeroed buffer with the same dimensions as `self`. Cannot fail since `self`
    /// already satisfies the shape invariant.
    pub(crate) fn blank_like(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: vec![0; self.data.len()],
        }
    }

    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * CHANNELS
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[Channel] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<Channel> {
        self.data
    }

    #[inline]
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Red channel at `(x, y)`. Callers must stay in bounds.
    #[inline]
    pub(crate) fn red_at(&self, x: u32, y: u32) -> Channel {
        self.data[self.offset(x, y)]
    }

    #[inline]
    pub(crate) fn put(&mut self, x: u32, y: u32, rgba: Rgba) {
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// Iterator over the pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = &[Channel]> {
        self.data.chunks_exact(CHANNELS)
    }

    /// Builds a new buffer of the same size by applying `f` to every pixel.
    pub fn map_pixels<F>(&self, mut f: F) -> Self
    where
        F: FnMut(Rgba) -> Rgba,
    {
        let mut data = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(CHANNELS) {
            data.extend_from_slice(&f([px[0], px[1], px[2], px[3]]));
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Scales the buffer to `width` x `height` with a bilinear filter. Matching
    /// dimensions return a plain copy.
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if (width, height) == self.dimensions() {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidBuffer { width, height, len: 0 });
        }
        let resized = imageops::resize(&self.to_rgba_image(), width, height, FilterType::Triangle);
        Self::try_from(resized)
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Shape is already validated, so `from_raw` always succeeds.
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = PipelineError;

    fn try_from(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        RgbaImage::from_raw(width, height, buffer.data)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }
}
