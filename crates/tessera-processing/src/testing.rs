//! A codec double for tests that need large nominal images without pixel work.
//!
//! Encoded "images" are a small header carrying a format tag and dimensions, padded
//! so byte sizes grow with area. Every decoded pixel is pure red.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use image::{Rgb as Pixel, RgbImage};
use tessera_core::{ImageSize, ImageType};

use crate::codec::{CodecError, CodecResult, ImageCodec};

const MAGIC: &[u8; 4] = b"FAKE";
const HEADER_LEN: usize = 13;
const TAG_PNG: u8 = b'P';
const TAG_JPEG: u8 = b'J';

#[derive(Debug, Default)]
pub struct FakeCodec {
    resizes: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeCodec {
    pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
        Self::encode(TAG_PNG, ImageSize::new(width, height)).to_vec()
    }

    pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        Self::encode(TAG_JPEG, ImageSize::new(width, height)).to_vec()
    }

    /// Number of `resize_and_crop` calls so far.
    pub fn resize_calls(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn encode(tag: u8, size: ImageSize) -> Bytes {
        let padding = (size.width as usize * size.height as usize) / 1000;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + padding);
        buf.put_slice(MAGIC);
        buf.put_u8(tag);
        buf.put_u32(size.width);
        buf.put_u32(size.height);
        buf.put_bytes(0, padding);
        buf.freeze()
    }

    fn parse(&self, data: &[u8]) -> CodecResult<(u8, ImageSize)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(CodecError::UnsupportedFormat(
                "unrecognised image header".to_string(),
            ));
        }
        let dim = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&data[at..at + 4]);
            u32::from_be_bytes(raw)
        };
        Ok((data[4], ImageSize::new(dim(5), dim(9))))
    }
}

impl ImageCodec for FakeCodec {
    fn get_size(&self, data: &[u8]) -> CodecResult<ImageSize> {
        Ok(self.parse(data)?.1)
    }

    fn convert_format(&self, data: &[u8], target: ImageType) -> CodecResult<Bytes> {
        let (tag, size) = self.parse(data)?;
        match target {
            ImageType::Jpeg if tag == TAG_JPEG => Ok(Bytes::copy_from_slice(data)),
            ImageType::Jpeg => Ok(Self::encode(TAG_JPEG, size)),
        }
    }

    fn resize_and_crop(&self, data: &[u8], size: ImageSize) -> CodecResult<Bytes> {
        self.parse(data)?;
        if size.width == 0 || size.height == 0 {
            return Err(CodecError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        self.resizes.fetch_add(1, Ordering::SeqCst);
        Ok(Self::encode(TAG_JPEG, size))
    }

    fn decode_pixels(&self, data: &[u8]) -> CodecResult<RgbImage> {
        let (_, size) = self.parse(data)?;
        // Uniform content, so a bounded grid samples the same color
        Ok(RgbImage::from_pixel(
            size.width.min(128),
            size.height.min(128),
            Pixel([255, 0, 0]),
        ))
    }
}
