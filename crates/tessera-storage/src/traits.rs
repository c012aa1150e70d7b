//! Storage abstraction trait
//!
//! [`ImageFileStore`] covers every filesystem side effect of ingestion and deletion.
//! None of it is transactional: callers order these steps around their metadata
//! transaction.

use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tessera_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid filename: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// A file written under its staging name, waiting to be promoted or discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub shard_id: i32,
    pub filename: String,
    pub staged_path: PathBuf,
    pub final_path: PathBuf,
    pub size_bytes: usize,
}

/// A stored file's bytes along with its modification time.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub data: Bytes,
    pub modified: SystemTime,
}

#[async_trait]
pub trait ImageFileStore: Send + Sync {
    /// Create the directory for a newly allocated shard.
    async fn create_shard_dir(&self, shard_id: i32) -> StorageResult<()>;

    /// Write `data` under a hidden staging name inside the shard directory.
    async fn stage(&self, shard_id: i32, filename: &str, data: Bytes) -> StorageResult<StagedFile>;

    /// Rename a staged file to its final name.
    async fn promote(&self, staged: &StagedFile) -> StorageResult<()>;

    /// Remove a staged file. Missing files are not an error.
    async fn discard(&self, staged: &StagedFile) -> StorageResult<()>;

    async fn read(&self, shard_id: i32, filename: &str) -> StorageResult<Bytes>;

    /// Like [`ImageFileStore::read`], also reporting when the file was last written.
    async fn read_stored(&self, shard_id: i32, filename: &str) -> StorageResult<StoredFile>;

    /// Remove every file in the shard whose name starts with `prefix`, returning the count.
    async fn remove_by_prefix(&self, shard_id: i32, prefix: &str) -> StorageResult<usize>;

    /// Copy a file into the archive directory. Returns `false` when archiving is disabled.
    async fn archive(&self, shard_id: i32, filename: &str) -> StorageResult<bool>;
}
