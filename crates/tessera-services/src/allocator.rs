use std::sync::Arc;

use tessera_core::{AppError, FolderShard};
use tessera_db::MetadataTransaction;
use tessera_storage::ImageFileStore;

/// Routes each new default image into the newest shard that still has room.
#[derive(Clone)]
pub struct ShardAllocator {
    files: Arc<dyn ImageFileStore>,
    capacity: i32,
}

impl ShardAllocator {
    pub fn new(files: Arc<dyn ImageFileStore>, capacity: i32) -> Self {
        Self { files, capacity }
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// Pick the shard for one more image, creating a new one when the newest is full.
    ///
    /// Must run inside the transaction that records the image. The new shard's
    /// directory is created immediately and survives a rollback; it is simply empty.
    pub async fn allocate(
        &self,
        tx: &mut dyn MetadataTransaction,
    ) -> Result<FolderShard, AppError> {
        let latest = tx.lock_latest_shard().await?;
        if let Some(shard) = latest.as_ref().filter(|s| s.has_room(self.capacity)) {
            return Ok(shard.clone());
        }

        let shard = tx.create_shard().await?;
        self.files.create_shard_dir(shard.id).await?;
        tracing::info!(
            shard_id = shard.id,
            previous_shard_id = ?latest.map(|s| s.id),
            capacity = self.capacity,
            "Allocated new shard"
        );
        Ok(shard)
    }
}
