//! Save / Get / Delete over the metadata store and the sharded file store.
//!
//! Saving stages every file under a hidden name while the metadata transaction is open and
//! renames them into place only after it commits. A rollback discards the staged files.
//! The remaining gap is a crash or rename failure after commit, which leaves a committed
//! record without some of its files. Deleting removes files before its commit, so a failed
//! commit leaves a live record without files. Neither case is reconciled here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tessera_core::{
    validate_specs, AppError, IdGenerator, ImageFit, ImageId, ImageRecord, ImageSize, ImageType,
    RenditionSpec,
};
use tessera_db::{MetadataStore, MetadataTransaction};
use tessera_processing::{PipelineOutput, VariantPipeline};
use tessera_storage::keys::{copy_filename, default_filename};
use tessera_storage::{ImageFileStore, StagedFile, StorageError};

use crate::allocator::ShardAllocator;

/// Outcome of a sequential bulk delete.
#[derive(Debug, Default)]
pub struct BulkDeleteReport {
    /// Records deleted (or already deleted) before the first failure, in request order
    pub deleted: Vec<ImageRecord>,
    pub failed: Option<BulkDeleteFailure>,
}

impl BulkDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

#[derive(Debug)]
pub struct BulkDeleteFailure {
    pub id: ImageId,
    pub error: AppError,
}

/// One stored rendition as served to clients.
#[derive(Debug, Clone)]
pub struct RenditionFile {
    pub data: Bytes,
    pub last_modified: DateTime<Utc>,
}

/// Postgres and the local filesystem keep microseconds at most.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now)
}

pub struct ImageStore {
    metadata: Arc<dyn MetadataStore>,
    files: Arc<dyn ImageFileStore>,
    pipeline: Arc<VariantPipeline>,
    allocator: ShardAllocator,
    ids: Arc<IdGenerator>,
}

impl ImageStore {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        files: Arc<dyn ImageFileStore>,
        pipeline: Arc<VariantPipeline>,
        ids: Arc<IdGenerator>,
        shard_capacity: i32,
    ) -> Self {
        Self {
            allocator: ShardAllocator::new(files.clone(), shard_capacity),
            metadata,
            files,
            pipeline,
            ids,
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Ingest one upload and return its stored record with URLs.
    ///
    /// An empty buffer or an invalid spec list fails before any file or row is written.
    #[tracing::instrument(skip(self, data, specs), fields(upload_size = data.len(), renditions = specs.len()))]
    pub async fn save(&self, data: Bytes, specs: Vec<RenditionSpec>) -> Result<ImageRecord, AppError> {
        let started = Instant::now();
        if data.is_empty() {
            return Err(AppError::InvalidInput("Image buffer is empty".to_string()));
        }
        validate_specs(&specs)?;

        let pipeline = self.pipeline.clone();
        let output = tokio::task::spawn_blocking(move || pipeline.run(&data, &specs))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to process image: {}", e)))??;

        let mut tx = self.metadata.begin().await?;
        let mut staged = Vec::new();
        let id = match self.record_upload(tx.as_mut(), &output, &mut staged).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back upload");
                }
                self.discard_all(&staged).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            self.discard_all(&staged).await;
            return Err(e);
        }
        self.promote_all(id, &staged).await?;

        let record = self
            .metadata
            .get_image(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Image {} missing after commit", id)))?;

        tracing::info!(
            image_id = %id,
            shard_id = record.shard_id,
            files = staged.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Processed image"
        );
        Ok(record.with_urls())
    }

    /// Allocate, stage and insert inside `tx`. Staged files are pushed as they are written
    /// so the caller can discard them on any failure.
    async fn record_upload(
        &self,
        tx: &mut dyn MetadataTransaction,
        output: &PipelineOutput,
        staged: &mut Vec<StagedFile>,
    ) -> Result<ImageId, AppError> {
        let shard = self.allocator.allocate(tx).await?;
        // The id embeds the same microsecond instant that is stored as `created_at`.
        let created_at = now_micros();
        let id = self.ids.generate_at(created_at);
        let image_type = output.output_type;

        let default_name = default_filename(&id, image_type);
        staged.push(
            self.files
                .stage(shard.id, &default_name, output.default.data.clone())
                .await?,
        );

        // Identical cover specs share a filename; write it once, keep both entries.
        let mut names = HashSet::new();
        for copy in &output.copies {
            let spec = copy.spec;
            let name = copy_filename(&id, spec.max_width, spec.max_height, spec.fit, image_type);
            if names.insert(name.clone()) {
                staged.push(self.files.stage(shard.id, &name, copy.data.clone()).await?);
            }
        }

        let default = &output.default;
        let record = ImageRecord {
            id,
            shard_id: shard.id,
            image_type,
            width: default.size.width,
            height: default.size.height,
            max_width: default.spec.max_width,
            max_height: default.spec.max_height,
            size: default.byte_size(),
            uploaded_size: output.uploaded_size,
            average_color: output.average_color,
            copies: output.copies.iter().map(|c| c.to_variant()).collect(),
            created_at,
            deleted: false,
            deleted_at: None,
            url: None,
            urls: None,
        };

        tx.insert_image(&record).await?;
        tx.record_shard_usage(shard.id, record.size).await?;
        Ok(id)
    }

    async fn discard_all(&self, staged: &[StagedFile]) {
        for file in staged {
            if let Err(e) = self.files.discard(file).await {
                tracing::warn!(
                    error = %e,
                    path = %file.staged_path.display(),
                    "Failed to discard staged file"
                );
            }
        }
    }

    /// Rename every staged file into place. Keeps going past failures and reports the first.
    async fn promote_all(&self, id: ImageId, staged: &[StagedFile]) -> Result<(), AppError> {
        let mut first_error = None;
        for file in staged {
            if let Err(e) = self.files.promote(file).await {
                tracing::error!(
                    error = %e,
                    image_id = %id,
                    path = %file.final_path.display(),
                    "Committed image is missing a file"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Look up one image. Deleted images are returned with `deleted` set.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ImageId) -> Result<ImageRecord, AppError> {
        self.metadata
            .get_image(id)
            .await?
            .map(ImageRecord::with_urls)
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))
    }

    /// Soft-delete an image and remove its files. Deleting twice returns the first result.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ImageId) -> Result<ImageRecord, AppError> {
        let mut record = self.get(id).await?;
        if record.deleted {
            tracing::debug!(image_id = %id, "Image already deleted");
            return Ok(record);
        }

        let at = now_micros();
        let mut tx = self.metadata.begin().await?;
        match self.remove_files(tx.as_mut(), &record, at).await {
            Ok(true) => {}
            Ok(false) => {
                // Lost a race with another delete; report what it committed.
                tx.rollback().await?;
                return self.get(id).await;
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back delete");
                }
                return Err(e);
            }
        }
        tx.commit().await?;

        record.deleted = true;
        record.deleted_at = Some(at);
        tracing::info!(image_id = %id, shard_id = record.shard_id, "Deleted image");
        Ok(record)
    }

    async fn remove_files(
        &self,
        tx: &mut dyn MetadataTransaction,
        record: &ImageRecord,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        if !tx.mark_deleted(record.id, at).await? {
            return Ok(false);
        }

        let default_name = default_filename(&record.id, record.image_type);
        match self.files.archive(record.shard_id, &default_name).await {
            Ok(_) => {}
            // The record exists, so a missing default is a storage fault, not a 404.
            Err(StorageError::NotFound(path)) => {
                return Err(AppError::Storage(format!(
                    "Default rendition missing from disk: {}",
                    path
                )))
            }
            Err(e) => return Err(e.into()),
        }

        self.files
            .remove_by_prefix(record.shard_id, &record.id.to_hex())
            .await?;
        Ok(true)
    }

    /// Delete each id in order, stopping at the first failure. Earlier deletions stay applied.
    pub async fn delete_many(&self, ids: &[ImageId]) -> BulkDeleteReport {
        let mut report = BulkDeleteReport::default();
        for &id in ids {
            match self.delete(id).await {
                Ok(record) => report.deleted.push(record),
                Err(error) => {
                    tracing::warn!(
                        image_id = %id,
                        error = %error,
                        deleted = report.deleted.len(),
                        remaining = ids.len() - report.deleted.len(),
                        "Bulk delete stopped"
                    );
                    report.failed = Some(BulkDeleteFailure { id, error });
                    break;
                }
            }
        }
        report
    }

    /// One stored rendition: the default when `size` is `None`, else the copy requested
    /// with those bounds and fit.
    pub async fn read_rendition(
        &self,
        shard_id: i32,
        id: ImageId,
        size: Option<ImageSize>,
        fit: ImageFit,
    ) -> Result<RenditionFile, AppError> {
        let name = match size {
            None => default_filename(&id, ImageType::Jpeg),
            Some(size) => copy_filename(&id, size.width, size.height, fit, ImageType::Jpeg),
        };
        match self.files.read_stored(shard_id, &name).await {
            Ok(file) => Ok(RenditionFile {
                data: file.data,
                last_modified: file.modified.into(),
            }),
            Err(StorageError::InvalidKey(_)) => {
                Err(AppError::NotFound(format!("Image {} not found", id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
