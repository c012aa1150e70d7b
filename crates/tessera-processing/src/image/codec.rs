use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader, RgbImage};
use tessera_core::constants::DEFAULT_JPEG_QUALITY;
use tessera_core::{ImageSize, ImageType};

use super::resize::select_filter;
use crate::codec::{CodecError, CodecResult, ImageCodec};

/// [`ImageCodec`] over the pure-Rust `image` crate, producing baseline JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateCodec {
    jpeg_quality: u8,
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCrateCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn decode(data: &[u8]) -> CodecResult<DynamicImage> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::UnsupportedFormat(e.to_string()))?
            .decode()
            .map_err(map_decode_error)
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> CodecResult<Bytes> {
        // JPEG has no alpha channel
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut buffer = Vec::with_capacity((width as usize * height as usize) / 4);
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| CodecError::Processing(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }

    fn is_jpeg(data: &[u8]) -> bool {
        matches!(image::guess_format(data), Ok(ImageFormat::Jpeg))
    }
}

fn map_decode_error(err: ImageError) -> CodecError {
    match err {
        ImageError::Decoding(_) | ImageError::Unsupported(_) | ImageError::Limits(_) => {
            CodecError::UnsupportedFormat(err.to_string())
        }
        other => CodecError::Processing(other.to_string()),
    }
}

impl ImageCodec for ImageCrateCodec {
    fn get_size(&self, data: &[u8]) -> CodecResult<ImageSize> {
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::UnsupportedFormat(e.to_string()))?
            .into_dimensions()
            .map_err(map_decode_error)?;
        Ok(ImageSize::new(width, height))
    }

    fn convert_format(&self, data: &[u8], target: ImageType) -> CodecResult<Bytes> {
        match target {
            ImageType::Jpeg if Self::is_jpeg(data) => Ok(Bytes::copy_from_slice(data)),
            ImageType::Jpeg => {
                let img = Self::decode(data)?;
                tracing::debug!(
                    width = img.width(),
                    height = img.height(),
                    "Converting upload to JPEG"
                );
                self.encode_jpeg(&img)
            }
        }
    }

    fn resize_and_crop(&self, data: &[u8], size: ImageSize) -> CodecResult<Bytes> {
        if size.width == 0 || size.height == 0 {
            return Err(CodecError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }

        let img = Self::decode(data)?;
        let (orig_width, orig_height) = img.dimensions();
        if (orig_width, orig_height) == (size.width, size.height) {
            if Self::is_jpeg(data) {
                return Ok(Bytes::copy_from_slice(data));
            }
            return self.encode_jpeg(&img);
        }

        let filter = select_filter(orig_width, orig_height, size.width, size.height);
        let resized = img.resize_to_fill(size.width, size.height, filter);
        self.encode_jpeg(&resized)
    }

    fn decode_pixels(&self, data: &[u8]) -> CodecResult<RgbImage> {
        Ok(Self::decode(data)?.to_rgb8())
    }
}
