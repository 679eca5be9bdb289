// THEORY:
// Face-region operations cut rectangles out of a base buffer, reshape them, and put
// them back. They drive the "replaced/swapped face" view:
//
// 1.  **One face**: the face is cropped, stretched to the output cell, and passed
//     through exactly one `FaceFilter`.
// 2.  **Several faces**: a cyclic swap. Face i is resized into face (i + 1) mod N's
//     rectangle. Every crop is taken from the untouched base *before* anything is
//     written, so no face is ever sourced from an already-swapped rectangle.
// 3.  **No faces**: no output.
//
// Regions arriving here are already in buffer space; `crop` still clamps them and
// reports `EmptyCrop` rather than reading out of bounds.

use crate::core_modules::channel_ops::to_grayscale;
use crate::core_modules::color_space::{ColorSpace, convert};
use crate::core_modules::pixel_buffer::{OPAQUE, PixelBuffer, Rgba};
use crate::core_modules::region::Region;
use crate::error::{PipelineError, Result};
use image::imageops;
use serde::{Deserialize, Serialize};

/// Effect applied to a single detected face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceFilter {
    #[default]
    None,
    Grayscale,
    Blur,
    Hsv,
    Pixelate,
}

/// Tunables for the filters that need them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub blur_sigma: f32,
    pub pixelate_block: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            pixelate_block: 5,
        }
    }
}

/// Copies the part of `region` that lies inside `buffer`.
pub fn crop(buffer: &PixelBuffer, region: &Region) -> Result<PixelBuffer> {
    let (width, height) = buffer.dimensions();
    let clamped = region
        .clamp_to(width, height)
        .ok_or(PipelineError::EmptyCrop {
            region: *region,
            width,
            height,
        })?;

    let mut data = Vec::with_capacity(clamped.width as usize * clamped.height as usize * 4);
    let bytes = buffer.as_bytes();
    for y in clamped.y..clamped.y + clamped.height {
        let start = buffer.offset(clamped.x, y);
        let end = start + clamped.width as usize * 4;
        data.extend_from_slice(&bytes[start..end]);
    }
    PixelBuffer::new(clamped.width, clamped.height, data)
}

/// Writes `patch` into `target` with its top-left corner at `(x, y)`, clipping
/// whatever falls outside.
fn paste(target: &mut PixelBuffer, patch: &PixelBuffer, x: u32, y: u32) {
    let (width, height) = target.dimensions();
    for py in 0..patch.height() {
        let ty = y + py;
        if ty >= height {
            break;
        }
        for px in 0..patch.width() {
            let tx = x + px;
            if tx >= width {
                break;
            }
            if let Some(rgba) = patch.pixel(px, py) {
                target.put(tx, ty, rgba);
            }
        }
    }
}

/// Block-averaged grayscale mosaic. Blocks on the right and bottom edges are
/// clipped to the buffer and average only their in-bounds pixels.
pub fn pixelate(buffer: &PixelBuffer, block: u32) -> PixelBuffer {
    let block = block.max(1);
    let gray = to_grayscale(buffer);
    let mut out = gray.blank_like();
    let (width, height) = gray.dimensions();

    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let x_end = (bx + block).min(width);
            let y_end = (by + block).min(height);

            let mut sum = 0u32;
            let mut count = 0u32;
            for y in by..y_end {
                for x in bx..x_end {
                    sum += gray.red_at(x, y) as u32;
                    count += 1;
                }
            }
            let avg = if count > 0 {
                (sum as f32 / count as f32).round() as u8
            } else {
                0
            };

            for y in by..y_end {
                for x in bx..x_end {
                    out.put(x, y, [avg, avg, avg, OPAQUE]);
                }
            }
        }
    }
    out
}

/// Gaussian blur via the `image` crate.
pub fn blur(buffer: &PixelBuffer, sigma: f32) -> Result<PixelBuffer> {
    let blurred = imageops::blur(&buffer.to_rgba_image(), sigma);
    PixelBuffer::try_from(blurred)
}

pub fn apply_face_filter(
    face: &PixelBuffer,
    filter: FaceFilter,
    settings: &FilterSettings,
) -> Result<PixelBuffer> {
    Ok(match filter {
        FaceFilter::None => face.clone(),
        FaceFilter::Grayscale => to_grayscale(face),
        FaceFilter::Blur => blur(face, settings.blur_sigma)?,
        FaceFilter::Hsv => convert(face, ColorSpace::Hsv),
        FaceFilter::Pixelate => pixelate(face, settings.pixelate_block),
    })
}

/// Crops one face, stretches it to `cell_width` x `cell_height`, and filters it.
pub fn single_face(
    base: &PixelBuffer,
    region: &Region,
    cell_width: u32,
    cell_height: u32,
    filter: FaceFilter,
    settings: &FilterSettings,
) -> Result<PixelBuffer> {
    let face = crop(base, region)?.resize(cell_width, cell_height)?;
    apply_face_filter(&face, filter, settings)
}

/// Cyclic swap: the face in `regions[i]` lands in `regions[(i + 1) % n]` on a copy
/// of `base`. All crops and resizes are staged before the first write.
pub fn swap_faces(base: &PixelBuffer, regions: &[Region]) -> Result<PixelBuffer> {
    let (width, height) = base.dimensions();
    let targets = regions
        .iter()
        .map(|region| {
            region.clamp_to(width, height).ok_or(PipelineError::EmptyCrop {
                region: *region,
                width,
                height,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let count = targets.len();
    let mut staged = Vec::with_capacity(count);
    for (i, source) in targets.iter().enumerate() {
        let target = targets[(i + 1) % count];
        let patch = crop(base, source)?.resize(target.width, target.height)?;
        staged.push((target, patch));
    }

    let mut out = base.clone();
    for (target, patch) in &staged {
        paste(&mut out, patch, target.x, target.y);
    }
    Ok(out)
}

/// Draws a `thickness`-pixel rectangle outline for every region on a copy of
/// `base`. Regions are clipped to the buffer; nothing outside is touched.
pub fn outline_regions(base: &PixelBuffer, regions: &[Region], color: Rgba, thickness: u32) -> PixelBuffer {
    let (width, height) = base.dimensions();
    let mut out = base.clone();
    let thickness = thickness.max(1);

    for region in regions.iter().filter_map(|r| r.clamp_to(width, height)) {
        let inner_x = region.width.saturating_sub(thickness);
        let inner_y = region.height.saturating_sub(thickness);
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let dx = x - region.x;
                let dy = y - region.y;
                let on_edge = dx < thickness || dy < thickness || dx >= inner_x || dy >= inner_y;
                if on_edge {
                    out.put(x, y, color);
                }
            }
        }
    }
    out
}
