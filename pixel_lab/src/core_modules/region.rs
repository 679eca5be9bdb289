// THEORY:
// Two rectangle types live here, one per coordinate space.
//
// - `FaceDetection` is what the external detector hands over: a floating-point box
//   in *detector* space (a 640x480 frame by default). It may hang off the frame
//   edges or even have a negative origin.
// - `Region` is an integer rectangle in *buffer* space, guaranteed non-negative and
//   (once clamped) fully inside the buffer it describes.
//
// `DetectorScale` bridges the two. Scaling floors the near edge and ceils the far
// edge, so a box never shrinks away from pixels it partly covers, then clamps to
// the buffer. A box with no overlap becomes `None` instead of an invalid region.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in buffer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Intersection with a `width` x `height` buffer, or `None` when nothing overlaps.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        if self.is_empty() || self.x >= width || self.y >= height {
            return None;
        }
        let right = self.right().min(width as u64) as u32;
        let bottom = self.bottom().min(height as u64) as u32;
        Some(Region::new(self.x, self.y, right - self.x, bottom - self.y))
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && (x as u64) < self.right() && y >= self.y && (y as u64) < self.bottom()
    }
}

/// A face bounding box as reported by the detector, in detector coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl FaceDetection {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: full_confidence(),
        }
    }
}

/// Fixed ratio between detector space and buffer space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorScale {
    pub x: f32,
    pub y: f32,
}

impl DetectorScale {
    /// Scale that maps a `detector_width` x `detector_height` frame onto a
    /// `buffer_width` x `buffer_height` buffer.
    pub fn between(detector_width: u32, detector_height: u32, buffer_width: u32, buffer_height: u32) -> Self {
        Self {
            x: buffer_width as f32 / detector_width as f32,
            y: buffer_height as f32 / detector_height as f32,
        }
    }

    /// Projects `detection` into buffer space and clamps it to the buffer.
    pub fn to_region(&self, detection: &FaceDetection, width: u32, height: u32) -> Option<Region> {
        let left = (detection.x * self.x).floor();
        let top = (detection.y * self.y).floor();
        let right = ((detection.x + detection.width) * self.x).ceil();
        let bottom = ((detection.y + detection.height) * self.y).ceil();

        if !(left.is_finite() && top.is_finite() && right.is_finite() && bottom.is_finite()) {
            return None;
        }

        let left = left.clamp(0.0, width as f32) as u32;
        let top = top.clamp(0.0, height as f32) as u32;
        let right = right.clamp(0.0, width as f32) as u32;
        let bottom = bottom.clamp(0.0, height as f32) as u32;

        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::new(left, top, right - left, bottom - top))
    }
}
