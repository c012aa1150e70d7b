//! Tessera Core Library
//!
//! Domain models, image identifiers, fitting geometry, error types and configuration
//! shared by every Tessera crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod id;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, StoreConfig};
pub use error::{AppError, AppResult, ErrorMetadata, LogLevel};
pub use geometry::{contain_fit, cover_fit, fit_size, ImageSize};
pub use id::{IdGenerator, ImageId, NullableImageId};
pub use models::{
    validate_specs, FolderShard, ImageFit, ImageRecord, ImageType, ImageVariant,
    RenditionSpec, Rgb,
};
