// THEORY:
// The `pipeline` module is the top-level API of the library. It turns one base
// buffer plus a parameter set into any of the named views shown by the demo grid.
//
// Key architectural principles:
// 1.  **Explicit State**: Everything a view depends on (thresholds, scale factors,
//     iteration count, face filter, current detections) arrives through
//     `PipelineConfig` and the `render` arguments. There are no process-wide globals.
// 2.  **Independent Views**: Each `View` is recomputed from the base buffer alone.
//     The only sharing is explicit composition inside a view (Sobel consumes the
//     brightened grayscale, channel thresholds consume the extracted channel).
// 3.  **Isolated Failure**: `render_all` returns one `Result` per view, so a view that
//     fails (say, an unusable face crop) never blocks the others from rendering.
// 4.  **Closed Dispatch**: Views and face filters are enums, so adding a mode is a
//     compile-checked change rather than a new string to match.

use crate::core_modules::channel_ops::{ColorChannel, extract_channel, grayscale_brighten, threshold_by_sum};
use crate::core_modules::color_space::{ColorSpace, convert};
use crate::core_modules::convolution::sobel;
use crate::core_modules::face_region::{self, FaceFilter, FilterSettings};
use crate::core_modules::morphology::morph_n;
use crate::core_modules::otsu::{apply_threshold, compute_threshold};
use crate::core_modules::pixel_buffer::{PixelBuffer, Rgba};
use crate::core_modules::region::{DetectorScale, FaceDetection, Region};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, instrument, warn};

const OUTLINE_COLOR: Rgba = [255, 0, 0, 255];
const OUTLINE_THICKNESS: u32 = 2;

/// Tunable parameters for the `VisionPipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub brightness_scale: f32,
    pub red_threshold: u8,
    pub green_threshold: u8,
    pub blue_threshold: u8,
    pub hsv_threshold: u8,
    pub ycbcr_threshold: u8,
    /// Sum threshold that binarises the red channel before the morphology view.
    pub morph_threshold: u8,
    pub morph_iterations: u32,
    pub face_filter: FaceFilter,
    /// When false the face views behave as if nothing was detected.
    pub face_detection_enabled: bool,
    /// Detections scoring below this are ignored.
    pub min_face_confidence: f32,
    pub cell_width: u32,
    pub cell_height: u32,
    /// Frame size the detector reports coordinates in.
    pub detector_width: u32,
    pub detector_height: u32,
    pub face_blur_sigma: f32,
    pub pixelate_block: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            brightness_scale: 1.2,
            red_threshold: 128,
            green_threshold: 128,
            blue_threshold: 128,
            hsv_threshold: 128,
            ycbcr_threshold: 128,
            morph_threshold: 128,
            morph_iterations: 1,
            face_filter: FaceFilter::None,
            face_detection_enabled: true,
            min_face_confidence: 0.5,
            cell_width: 160,
            cell_height: 120,
            detector_width: 640,
            detector_height: 480,
            face_blur_sigma: 1.5,
            pixelate_block: 5,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.brightness_scale.is_finite() || self.brightness_scale < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "brightness_scale must be a non-negative number, got {}",
                self.brightness_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_face_confidence must lie in [0, 1], got {}",
                self.min_face_confidence
            )));
        }
        if self.cell_width == 0 || self.cell_height == 0 {
            return Err(PipelineError::InvalidConfig("cell dimensions must be non-zero".into()));
        }
        if self.detector_width == 0 || self.detector_height == 0 {
            return Err(PipelineError::InvalidConfig("detector dimensions must be non-zero".into()));
        }
        if !self.face_blur_sigma.is_finite() || self.face_blur_sigma <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "face_blur_sigma must be positive, got {}",
                self.face_blur_sigma
            )));
        }
        if self.pixelate_block == 0 {
            return Err(PipelineError::InvalidConfig("pixelate_block must be at least 1".into()));
        }
        Ok(())
    }

    /// Scale from detector space onto a `width` x `height` buffer.
    pub fn detector_scale(&self, width: u32, height: u32) -> DetectorScale {
        DetectorScale::between(self.detector_width, self.detector_height, width, height)
    }

    fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            blur_sigma: self.face_blur_sigma,
            pixelate_block: self.pixelate_block,
        }
    }
}

/// Every cell of the demo grid, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Webcam,
    GrayBright,
    Red,
    Green,
    Blue,
    RedThreshold,
    GreenThreshold,
    BlueThreshold,
    FaceOutline,
    Hsv,
    YCbCr,
    Face,
    HsvThreshold,
    YCbCrThreshold,
    Lab,
    Sobel,
    Morphology,
    Otsu,
}

impl View {
    pub const ALL: [View; 18] = [
        View::Webcam,
        View::GrayBright,
        View::Red,
        View::Green,
        View::Blue,
        View::RedThreshold,
        View::GreenThreshold,
        View::BlueThreshold,
        View::FaceOutline,
        View::Hsv,
        View::YCbCr,
        View::Face,
        View::HsvThreshold,
        View::YCbCrThreshold,
        View::Lab,
        View::Sobel,
        View::Morphology,
        View::Otsu,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            View::Webcam => "Webcam image",
            View::GrayBright => "Grayscale + brightness +20%",
            View::Red => "Red channel",
            View::Green => "Green channel",
            View::Blue => "Blue channel",
            View::RedThreshold => "Threshold image (R)",
            View::GreenThreshold => "Threshold image (G)",
            View::BlueThreshold => "Threshold image (B)",
            View::FaceOutline => "Webcam image (repeat)",
            View::Hsv => "HSV color-coded",
            View::YCbCr => "YCbCr color-coded",
            View::Face => "Face detection & replaced/swapped face",
            View::HsvThreshold => "Thresholded HSV",
            View::YCbCrThreshold => "Thresholded YCbCr",
            View::Lab => "LAB color-coded",
            View::Sobel => "Sobel edges",
            View::Morphology => "Morph",
            View::Otsu => "Otsu Color Space",
        }
    }

    /// Cell caption for the current parameters. Only the morphology caption
    /// depends on them, showing the number of passes.
    pub fn caption(&self, config: &PipelineConfig) -> Cow<'static, str> {
        match self {
            View::Morphology => Cow::Owned(format!("Morph x{}", config.morph_iterations)),
            other => Cow::Borrowed(other.label()),
        }
    }

    /// Short identifier, handy for file names.
    pub fn slug(&self) -> &'static str {
        match self {
            View::Webcam => "webcam",
            View::GrayBright => "gray_bright",
            View::Red => "red",
            View::Green => "green",
            View::Blue => "blue",
            View::RedThreshold => "red_threshold",
            View::GreenThreshold => "green_threshold",
            View::BlueThreshold => "blue_threshold",
            View::FaceOutline => "face_outline",
            View::Hsv => "hsv",
            View::YCbCr => "ycbcr",
            View::Face => "face",
            View::HsvThreshold => "hsv_threshold",
            View::YCbCrThreshold => "ycbcr_threshold",
            View::Lab => "lab",
            View::Sobel => "sobel",
            View::Morphology => "morphology",
            View::Otsu => "otsu",
        }
    }
}

/// Output of one view for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewImage {
    /// Nothing to show (e.g. the face view with no faces detected).
    Blank,
    Rendered(PixelBuffer),
}

impl ViewImage {
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        match self {
            ViewImage::Blank => None,
            ViewImage::Rendered(buffer) => Some(buffer),
        }
    }
}

/// One frame's worth of rendered views, each with its own outcome.
#[derive(Debug)]
pub struct FrameReport {
    pub views: Vec<(View, Result<ViewImage>)>,
}

impl FrameReport {
    pub fn get(&self, view: View) -> Option<&Result<ViewImage>> {
        self.views.iter().find(|(v, _)| *v == view).map(|(_, r)| r)
    }

    pub fn failures(&self) -> usize {
        self.views.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// The stateless orchestrator.
#[derive(Debug, Clone)]
pub struct VisionPipeline {
    config: PipelineConfig,
}

impl VisionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Scales a capture frame down to the working cell size.
    pub fn prepare_base(&self, capture: &PixelBuffer) -> Result<PixelBuffer> {
        capture.resize(self.config.cell_width, self.config.cell_height)
    }

    /// Maps detector boxes into regions of `base`. Boxes below the confidence floor
    /// or missing the buffer are dropped. Returns nothing at all while face
    /// detection is disabled.
    pub fn face_regions(&self, base: &PixelBuffer, detections: &[FaceDetection]) -> Vec<Region> {
        if !self.config.face_detection_enabled {
            return Vec::new();
        }
        let (width, height) = base.dimensions();
        let scale = self.config.detector_scale(width, height);
        detections
            .iter()
            .filter_map(|detection| {
                if detection.confidence < self.config.min_face_confidence {
                    debug!(?detection, "detection below confidence floor, dropping it");
                    return None;
                }
                let region = scale.to_region(detection, width, height);
                if region.is_none() {
                    debug!(?detection, "detection lies outside the buffer, dropping it");
                }
                region
            })
            .collect()
    }

    #[instrument(level = "debug", skip_all, fields(view = view.slug()))]
    pub fn render(&self, view: View, base: &PixelBuffer, detections: &[FaceDetection]) -> Result<ViewImage> {
        let c = &self.config;
        let image = match view {
            View::Webcam => base.clone(),
            View::GrayBright => grayscale_brighten(base, c.brightness_scale),
            View::Red => extract_channel(base, ColorChannel::Red),
            View::Green => extract_channel(base, ColorChannel::Green),
            View::Blue => extract_channel(base, ColorChannel::Blue),
            View::RedThreshold => channel_threshold(base, ColorChannel::Red, c.red_threshold),
            View::GreenThreshold => channel_threshold(base, ColorChannel::Green, c.green_threshold),
            View::BlueThreshold => channel_threshold(base, ColorChannel::Blue, c.blue_threshold),
            View::FaceOutline => {
                let regions = self.face_regions(base, detections);
                face_region::outline_regions(base, &regions, OUTLINE_COLOR, OUTLINE_THICKNESS)
            }
            View::Hsv => convert(base, ColorSpace::Hsv),
            View::YCbCr => convert(base, ColorSpace::YCbCr),
            View::Face => return self.render_face(base, detections),
            View::HsvThreshold => threshold_by_sum(&convert(base, ColorSpace::Hsv), c.hsv_threshold.into()),
            View::YCbCrThreshold => {
                threshold_by_sum(&convert(base, ColorSpace::YCbCr), c.ycbcr_threshold.into())
            }
            View::Lab => convert(base, ColorSpace::Lab),
            View::Sobel => sobel(&grayscale_brighten(base, c.brightness_scale)),
            View::Morphology => {
                let binary = channel_threshold(base, ColorChannel::Red, c.morph_threshold);
                morph_n(&binary, c.morph_iterations)
            }
            View::Otsu => {
                let gray = grayscale_brighten(base, c.brightness_scale);
                let t = compute_threshold(&gray);
                debug!(threshold = t, "otsu threshold selected");
                apply_threshold(&gray, t)
            }
        };
        Ok(ViewImage::Rendered(image))
    }

    fn render_face(&self, base: &PixelBuffer, detections: &[FaceDetection]) -> Result<ViewImage> {
        let regions = self.face_regions(base, detections);
        let c = &self.config;
        match regions.as_slice() {
            [] => Ok(ViewImage::Blank),
            [face] => face_region::single_face(
                base,
                face,
                c.cell_width,
                c.cell_height,
                c.face_filter,
                &c.filter_settings(),
            )
            .map(ViewImage::Rendered),
            many => face_region::swap_faces(base, many).map(ViewImage::Rendered),
        }
    }

    /// Renders every view in page order. A failing view is logged and reported in
    /// its slot; the rest are unaffected.
    pub fn render_all(&self, base: &PixelBuffer, detections: &[FaceDetection]) -> FrameReport {
        let views = View::ALL
            .iter()
            .map(|&view| {
                let result = self.render(view, base, detections);
                if let Err(err) = &result {
                    warn!(view = view.slug(), error = %err, "view failed to render");
                }
                (view, result)
            })
            .collect();
        FrameReport { views }
    }
}

fn channel_threshold(base: &PixelBuffer, channel: ColorChannel, threshold: u8) -> PixelBuffer {
    threshold_by_sum(&extract_channel(base, channel), threshold.into())
}
