use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::keys::{is_valid_filename, staged_filename};
use crate::traits::{ImageFileStore, StagedFile, StorageError, StorageResult, StoredFile};

/// Local filesystem storage split into numbered shard directories.
#[derive(Debug, Clone)]
pub struct ShardedLocalStorage {
    root: PathBuf,
    archive_dir: Option<PathBuf>,
}

impl ShardedLocalStorage {
    /// Create the storage, making sure the root and archive directories exist.
    ///
    /// # Arguments
    /// * `root` - Directory holding the shard directories (e.g., "./uploads")
    /// * `archive_dir` - Where deleted defaults are copied; `None` disables archiving
    pub async fn new(root: impl Into<PathBuf>, archive_dir: Option<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        ensure_dir(&root).await?;
        if let Some(dir) = &archive_dir {
            ensure_dir(dir).await?;
        }

        Ok(ShardedLocalStorage { root, archive_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_dir(&self) -> Option<&Path> {
        self.archive_dir.as_deref()
    }

    pub fn shard_dir(&self, shard_id: i32) -> PathBuf {
        self.root.join(shard_id.to_string())
    }

    /// Convert shard and filename to a path, rejecting anything but a plain filename.
    fn file_path(&self, shard_id: i32, filename: &str) -> StorageResult<PathBuf> {
        if shard_id <= 0 {
            return Err(StorageError::InvalidKey(format!("shard {}", shard_id)));
        }
        if !is_valid_filename(filename) {
            return Err(StorageError::InvalidKey(
                "Filename contains invalid characters".to_string(),
            ));
        }
        Ok(self.shard_dir(shard_id).join(filename))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Create `dir` if missing; fail if the path exists but is not a directory.
async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StorageError::ConfigError(format!(
            "{} exists and is not a directory",
            dir.display()
        ))),
        Err(_) => fs::create_dir_all(dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                dir.display(),
                e
            ))
        }),
    }
}

/// Write and fsync `path`. On failure the partly written file is removed again.
async fn write_synced(path: &Path, data: &[u8]) -> StorageResult<()> {
    let result = write_file(path, data).await;
    if result.is_err() {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to remove partial file");
            }
        }
    }
    result
}

async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
    })?;

    file.write_all(data).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;

    file.flush().await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;

    file.sync_all().await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })?;

    Ok(())
}

#[async_trait]
impl ImageFileStore for ShardedLocalStorage {
    async fn create_shard_dir(&self, shard_id: i32) -> StorageResult<()> {
        let dir = self.shard_dir(shard_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create shard directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        tracing::info!(shard_id, path = %dir.display(), "Created shard directory");
        Ok(())
    }

    async fn stage(&self, shard_id: i32, filename: &str, data: Bytes) -> StorageResult<StagedFile> {
        let final_path = self.file_path(shard_id, filename)?;
        let staged_path = self.file_path(shard_id, &staged_filename(filename))?;
        self.ensure_parent_dir(&staged_path).await?;

        let start = std::time::Instant::now();
        write_synced(&staged_path, &data).await?;

        tracing::debug!(
            path = %staged_path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Staged rendition"
        );

        Ok(StagedFile {
            shard_id,
            filename: filename.to_string(),
            staged_path,
            final_path,
            size_bytes: data.len(),
        })
    }

    async fn promote(&self, staged: &StagedFile) -> StorageResult<()> {
        fs::rename(&staged.staged_path, &staged.final_path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to move {} into place: {}",
                    staged.final_path.display(),
                    e
                ))
            })?;

        tracing::info!(
            path = %staged.final_path.display(),
            size_bytes = staged.size_bytes,
            "Stored rendition"
        );
        Ok(())
    }

    async fn discard(&self, staged: &StagedFile) -> StorageResult<()> {
        match fs::remove_file(&staged.staged_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to discard {}: {}",
                staged.staged_path.display(),
                e
            ))),
        }
    }

    async fn read(&self, shard_id: i32, filename: &str) -> StorageResult<Bytes> {
        let path = self.file_path(shard_id, filename)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{}/{}", shard_id, filename)))
            }
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn read_stored(&self, shard_id: i32, filename: &str) -> StorageResult<StoredFile> {
        let path = self.file_path(shard_id, filename)?;

        let modified = match fs::metadata(&path).await {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", shard_id, filename)));
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to stat file {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let data = self.read(shard_id, filename).await?;
        Ok(StoredFile { data, modified })
    }

    async fn remove_by_prefix(&self, shard_id: i32, prefix: &str) -> StorageResult<usize> {
        if !is_valid_filename(prefix) {
            return Err(StorageError::InvalidKey(prefix.to_string()));
        }
        let dir = self.shard_dir(shard_id);
        let start = std::time::Instant::now();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %dir.display(), "Shard directory missing, nothing to remove");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(prefix) {
                continue;
            }
            fs::remove_file(entry.path()).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
            removed += 1;
        }

        tracing::info!(
            path = %dir.display(),
            prefix = %prefix,
            removed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Removed renditions"
        );
        Ok(removed)
    }

    async fn archive(&self, shard_id: i32, filename: &str) -> StorageResult<bool> {
        let Some(archive_dir) = &self.archive_dir else {
            return Ok(false);
        };
        let data = self.read(shard_id, filename).await?;
        let target = archive_dir.join(filename);
        write_synced(&target, &data).await?;

        tracing::info!(path = %target.display(), size_bytes = data.len(), "Archived image");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(root: &Path, archive: Option<PathBuf>) -> ShardedLocalStorage {
        ShardedLocalStorage::new(root, archive).await.unwrap()
    }

    #[tokio::test]
    async fn test_stage_then_promote() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        storage.create_shard_dir(1).await.unwrap();

        let staged = storage
            .stage(1, "abc.jpg", Bytes::from_static(b"jpeg bytes"))
            .await
            .unwrap();
        assert!(staged.staged_path.exists());
        assert!(!staged.final_path.exists());
        assert!(matches!(
            storage.read(1, "abc.jpg").await,
            Err(StorageError::NotFound(_))
        ));

        storage.promote(&staged).await.unwrap();
        assert!(!staged.staged_path.exists());
        assert_eq!(storage.read(1, "abc.jpg").await.unwrap(), &b"jpeg bytes"[..]);
    }

    #[tokio::test]
    async fn test_read_stored_reports_modification_time() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        let staged = storage
            .stage(1, "abc.jpg", Bytes::from_static(b"jpeg bytes"))
            .await
            .unwrap();
        storage.promote(&staged).await.unwrap();

        let stored = storage.read_stored(1, "abc.jpg").await.unwrap();
        assert_eq!(stored.data, &b"jpeg bytes"[..]);
        assert_eq!(
            stored.modified,
            std::fs::metadata(&staged.final_path).unwrap().modified().unwrap()
        );

        assert!(matches!(
            storage.read_stored(1, "missing.jpg").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.read_stored(1, "../abc.jpg").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_discard_removes_staged_file() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        let staged = storage
            .stage(2, "abc.jpg", Bytes::from_static(b"x"))
            .await
            .unwrap();
        storage.discard(&staged).await.unwrap();
        assert!(!staged.staged_path.exists());
        // discarding twice is fine
        storage.discard(&staged).await.unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_stage_leaves_no_partial_file() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        storage.create_shard_dir(1).await.unwrap();

        // every write through this link fails with ENOSPC
        let staged_path = storage.shard_dir(1).join(staged_filename("abc.jpg"));
        std::os::unix::fs::symlink(full, &staged_path).unwrap();

        let result = storage
            .stage(1, "abc.jpg", Bytes::from_static(b"jpeg bytes"))
            .await;
        assert!(matches!(result, Err(StorageError::WriteFailed(_))));
        assert!(std::fs::symlink_metadata(&staged_path).is_err());
        assert!(full.exists());
        assert_eq!(std::fs::read_dir(storage.shard_dir(1)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_remove_by_prefix() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        for name in ["aaa.jpg", "aaa_100_100_contain.jpg", "bbb.jpg"] {
            let staged = storage.stage(1, name, Bytes::from_static(b"x")).await.unwrap();
            storage.promote(&staged).await.unwrap();
        }

        assert_eq!(storage.remove_by_prefix(1, "aaa").await.unwrap(), 2);
        assert!(storage.read(1, "bbb.jpg").await.is_ok());
        assert_eq!(storage.remove_by_prefix(1, "aaa").await.unwrap(), 0);
        assert_eq!(storage.remove_by_prefix(99, "aaa").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("deleted");
        let storage = storage(&dir.path().join("uploads"), Some(archive.clone())).await;
        let staged = storage.stage(1, "aaa.jpg", Bytes::from_static(b"img")).await.unwrap();
        storage.promote(&staged).await.unwrap();

        assert!(storage.archive(1, "aaa.jpg").await.unwrap());
        assert_eq!(std::fs::read(archive.join("aaa.jpg")).unwrap(), b"img");
    }

    #[tokio::test]
    async fn test_archive_disabled() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;
        assert!(!storage.archive(1, "missing.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), None).await;

        let result = storage.read(1, "../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.stage(1, "a/b.jpg", Bytes::new()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.read(0, "abc.jpg").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let result = ShardedLocalStorage::new(&file, None).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
