//! Tessera metadata persistence: shards and image catalog records in Postgres.

pub mod db;

pub use db::{
    ImageRepository, MetadataStore, MetadataTransaction, PgMetadataStore, ShardRepository,
};
#[cfg(any(test, feature = "test-utils"))]
pub use db::{FailPoint, MemoryMetadataStore};
