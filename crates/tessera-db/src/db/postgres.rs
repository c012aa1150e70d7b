use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tessera_core::{AppError, FolderShard, ImageId, ImageRecord};

use super::image::ImageRepository;
use super::shard::ShardRepository;
use super::store::{MetadataStore, MetadataTransaction};
use super::transaction::TransactionGuard;

/// [`MetadataStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
    shards: ShardRepository,
    images: ImageRepository,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            shards: ShardRepository::new(pool.clone()),
            images: ImageRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn shards(&self) -> &ShardRepository {
        &self.shards
    }

    pub fn images(&self) -> &ImageRepository {
        &self.images
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn begin(&self) -> Result<Box<dyn MetadataTransaction>, AppError> {
        let guard = TransactionGuard::begin(&self.pool).await?;
        Ok(Box::new(PgMetadataTransaction {
            guard,
            shards: self.shards.clone(),
            images: self.images.clone(),
        }))
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, AppError> {
        self.images.get(id).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgMetadataTransaction {
    guard: TransactionGuard,
    shards: ShardRepository,
    images: ImageRepository,
}

#[async_trait]
impl MetadataTransaction for PgMetadataTransaction {
    async fn lock_latest_shard(&mut self) -> Result<Option<FolderShard>, AppError> {
        let tx = self.guard.as_mut()?;
        self.shards.lock_latest_tx(tx).await
    }

    async fn create_shard(&mut self) -> Result<FolderShard, AppError> {
        let tx = self.guard.as_mut()?;
        self.shards.create_tx(tx).await
    }

    async fn record_shard_usage(&mut self, shard_id: i32, bytes: i64) -> Result<(), AppError> {
        let tx = self.guard.as_mut()?;
        self.shards.record_usage_tx(tx, shard_id, bytes).await
    }

    async fn insert_image(&mut self, image: &ImageRecord) -> Result<(), AppError> {
        let tx = self.guard.as_mut()?;
        self.images.insert_tx(tx, image).await
    }

    async fn mark_deleted(&mut self, id: ImageId, at: DateTime<Utc>) -> Result<bool, AppError> {
        let tx = self.guard.as_mut()?;
        self.images.mark_deleted_tx(tx, id, at).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.guard.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.guard.rollback().await?;
        Ok(())
    }
}
