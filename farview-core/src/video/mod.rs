//! Frame model and pixel conversion for the display pipeline.

pub mod convert;
pub mod frame;

pub use convert::RgbConverter;
pub use frame::{FrameSource, PixelFormat, Plane, RgbImage, VideoFrame};
