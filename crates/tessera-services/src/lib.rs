//! Tessera Services Layer
//!
//! Business orchestration over the processing, storage and metadata crates. The API crate
//! talks to [`ImageStore`] only; keep HTTP handling there and coordination here.

pub mod allocator;
pub mod image_store;

pub use allocator::ShardAllocator;
pub use image_store::{BulkDeleteFailure, BulkDeleteReport, ImageStore, RenditionFile};
