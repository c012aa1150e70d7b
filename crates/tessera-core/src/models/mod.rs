pub mod image;
pub mod shard;

pub use image::{
    validate_specs, ImageFit, ImageRecord, ImageType, ImageVariant, RenditionSpec, Rgb,
};
pub use shard::FolderShard;
