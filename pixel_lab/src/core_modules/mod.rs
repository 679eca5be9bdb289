pub mod channel_ops;
pub mod color_space;
pub mod convolution;
pub mod detection;
pub mod face_region;
pub mod morphology;
pub mod otsu;
pub mod pixel_buffer;
pub mod region;
pub mod utils;
