//! Metadata store seam
//!
//! Ingestion and deletion run their catalog changes inside one [`MetadataTransaction`].
//! Shard allocation is serialized from [`MetadataTransaction::lock_latest_shard`] until
//! the transaction ends, so usage counters never overshoot capacity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_core::{AppError, FolderShard, ImageId, ImageRecord};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, AppError>;

    /// Fetch an image by id. Soft-deleted images are returned with `deleted` set.
    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, AppError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait MetadataTransaction: Send {
    /// Serialize shard allocation for the rest of this transaction and return the newest shard.
    async fn lock_latest_shard(&mut self) -> Result<Option<FolderShard>, AppError>;

    async fn create_shard(&mut self) -> Result<FolderShard, AppError>;

    /// Add one default image of `bytes` bytes to the shard's counters.
    async fn record_shard_usage(&mut self, shard_id: i32, bytes: i64) -> Result<(), AppError>;

    async fn insert_image(&mut self, image: &ImageRecord) -> Result<(), AppError>;

    /// Returns `false` when no live image has this id.
    async fn mark_deleted(&mut self, id: ImageId, at: DateTime<Utc>) -> Result<bool, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
