//! Tessera Storage Library
//!
//! Sharded filesystem storage for image renditions.
//!
//! # Layout
//!
//! - default rendition: `<root>/<shard>/<id>.jpg`
//! - copy rendition: `<root>/<shard>/<id>_<maxWidth>_<maxHeight>_<fit>.jpg`
//! - archived default: `<archive>/<id>.jpg`
//!
//! New files are first written under a hidden staging name in their shard directory and
//! renamed into place once the metadata that references them is committed.

pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::ShardedLocalStorage;
pub use traits::{ImageFileStore, StagedFile, StorageError, StorageResult, StoredFile};
