//! Tessera image processing
//!
//! The [`ImageCodec`] seam over pixel work, the `image`-crate implementation of it,
//! dominant color sampling, and the rendition pipeline that decides which files an
//! upload produces.

pub mod codec;
pub mod color;
pub mod image;
pub mod pipeline;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use codec::{CodecError, ImageCodec};
pub use color::average_color;
pub use crate::image::ImageCrateCodec;
pub use pipeline::{PipelineOutput, Rendition, VariantPipeline};
