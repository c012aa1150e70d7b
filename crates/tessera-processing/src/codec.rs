//! The narrow interface through which pixel work is done.
//!
//! Everything here is synchronous and CPU bound. Async callers run it on the
//! blocking pool.

use bytes::Bytes;
use image::RgbImage;
use tessera_core::{AppError, ImageSize, ImageType};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input could not be parsed or converted as an image
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Encoding or resampling failed on an otherwise readable image
    #[error("image processing failed: {0}")]
    Processing(String),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedFormat(msg) => AppError::UnsupportedFormat(msg),
            CodecError::InvalidDimensions { .. } => AppError::InvalidInput(err.to_string()),
            CodecError::Processing(msg) => AppError::ImageProcessing(msg),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

pub trait ImageCodec: Send + Sync {
    /// Pixel dimensions of an encoded image.
    fn get_size(&self, data: &[u8]) -> CodecResult<ImageSize>;

    /// Re-encode `data` as `target`, returning it unchanged if already in that format.
    fn convert_format(&self, data: &[u8], target: ImageType) -> CodecResult<Bytes>;

    /// Resize to exactly `size`, cropping to preserve the aspect ratio when needed.
    fn resize_and_crop(&self, data: &[u8], size: ImageSize) -> CodecResult<Bytes>;

    /// Decode to an 8-bit RGB grid.
    fn decode_pixels(&self, data: &[u8]) -> CodecResult<RgbImage>;
}
