// THEORY:
// This file is the main entry point for the `pixel_lab` library crate.
//
// The public surface is the `VisionPipeline` (one view at a time, or a whole frame
// with `render_all`) and its `ParallelPipeline` counterpart that spreads a frame's
// views over a worker pool. The individual transforms in `core_modules` stay public
// so each one can be studied and tested on its own, but a caller driving the demo
// grid only needs the pipeline types re-exported below.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::detection::{
    DetectionPublisher, DetectionReader, FaceDetector, FixedDetector, latest_slot, spawn_detector_loop,
};
pub use core_modules::face_region::FaceFilter;
pub use core_modules::pixel_buffer::PixelBuffer;
pub use core_modules::region::{FaceDetection, Region};
pub use error::{PipelineError, Result};
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{FrameReport, PipelineConfig, View, ViewImage, VisionPipeline};
