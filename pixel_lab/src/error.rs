// THEORY:
// Every fallible step of the pipeline reports through a single error enum. Buffer
// shape problems are caught once, when a `PixelBuffer` is built, so the transforms
// themselves never fail; what remains are geometric failures (a crop that misses
// the image), configuration mistakes, and errors bubbling up from collaborators
// (image codecs, the filesystem, JSON parsing, the worker pool).

use crate::core_modules::region::Region;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Zero width/height, or a data length that is not `width * height * 4`.
    #[error("invalid buffer: {width}x{height} with {len} bytes")]
    InvalidBuffer { width: u32, height: u32, len: usize },

    /// The requested region does not overlap the buffer at all.
    #[error("region {region:?} lies outside the {width}x{height} buffer")]
    EmptyCrop {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("worker pool is no longer accepting tasks")]
    WorkerUnavailable,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
