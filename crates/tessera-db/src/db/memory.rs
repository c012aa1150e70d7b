//! In-memory [`MetadataStore`] for tests.
//!
//! One transaction runs at a time. A transaction snapshots the whole state on begin and
//! restores it on rollback or drop. Failures can be injected at named points.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_core::{AppError, FolderShard, ImageId, ImageRecord};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{MetadataStore, MetadataTransaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    shards: Vec<FolderShard>,
    images: BTreeMap<ImageId, ImageRecord>,
}

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateShard,
    InsertImage,
    MarkDeleted(ImageId),
    Commit,
}

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<Mutex<MemoryState>>,
    failure: Arc<std::sync::Mutex<Option<FailPoint>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later operation at `point` fail until [`clear_failure`](Self::clear_failure).
    pub fn fail_at(&self, point: FailPoint) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub async fn shards(&self) -> Vec<FolderShard> {
        self.state.lock().await.shards.clone()
    }

    pub async fn images(&self) -> Vec<ImageRecord> {
        self.state.lock().await.images.values().cloned().collect()
    }
}

fn check(failure: &std::sync::Mutex<Option<FailPoint>>, point: FailPoint) -> Result<(), AppError> {
    if *failure.lock().unwrap_or_else(|e| e.into_inner()) == Some(point) {
        return Err(AppError::Internal(format!("Injected failure at {:?}", point)));
    }
    Ok(())
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, AppError> {
        let state = self.state.clone().lock_owned().await;
        let snapshot = state.clone();
        Ok(Box::new(MemoryTransaction {
            state,
            snapshot: Some(snapshot),
            failure: self.failure.clone(),
        }))
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, AppError> {
        Ok(self.state.lock().await.images.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    state: OwnedMutexGuard<MemoryState>,
    /// `None` once committed
    snapshot: Option<MemoryState>,
    failure: Arc<std::sync::Mutex<Option<FailPoint>>>,
}

impl MemoryTransaction {
    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait]
impl MetadataTransaction for MemoryTransaction {
    async fn lock_latest_shard(&mut self) -> Result<Option<FolderShard>, AppError> {
        Ok(self.state.shards.last().cloned())
    }

    async fn create_shard(&mut self) -> Result<FolderShard, AppError> {
        check(&self.failure, FailPoint::CreateShard)?;
        let id = self.state.shards.last().map_or(1, |s| s.id + 1);
        let shard = FolderShard {
            id,
            image_count: 0,
            total_size: 0,
            created_at: Utc::now(),
        };
        self.state.shards.push(shard.clone());
        Ok(shard)
    }

    async fn record_shard_usage(&mut self, shard_id: i32, bytes: i64) -> Result<(), AppError> {
        let shard = self
            .state
            .shards
            .iter_mut()
            .find(|s| s.id == shard_id)
            .ok_or_else(|| AppError::Internal(format!("Shard {} does not exist", shard_id)))?;
        shard.image_count += 1;
        shard.total_size += bytes;
        Ok(())
    }

    async fn insert_image(&mut self, image: &ImageRecord) -> Result<(), AppError> {
        check(&self.failure, FailPoint::InsertImage)?;
        if self.state.images.contains_key(&image.id) {
            return Err(AppError::Internal(format!("Duplicate image id {}", image.id)));
        }
        self.state.images.insert(image.id, image.clone());
        Ok(())
    }

    async fn mark_deleted(&mut self, id: ImageId, at: DateTime<Utc>) -> Result<bool, AppError> {
        check(&self.failure, FailPoint::MarkDeleted(id))?;
        match self.state.images.get_mut(&id) {
            Some(image) if !image.deleted => {
                image.deleted = true;
                image.deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut this = self;
        check(&this.failure, FailPoint::Commit)?;
        this.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let mut this = self;
        this.restore();
        Ok(())
    }
}
