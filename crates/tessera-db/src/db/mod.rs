//! Database repositories and the metadata store seam
//!
//! `ShardRepository` and `ImageRepository` hold the SQL. `PgMetadataStore` composes them
//! behind the [`MetadataStore`] trait that the ingestion service depends on.

pub mod image;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;
pub mod shard;
pub mod store;
pub mod transaction;

pub use image::ImageRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{FailPoint, MemoryMetadataStore};
pub use postgres::PgMetadataStore;
pub use shard::ShardRepository;
pub use store::{MetadataStore, MetadataTransaction};
