//! Codec backed by the `image` crate.

mod codec;
mod resize;

pub use codec::ImageCrateCodec;
pub use resize::select_filter;
