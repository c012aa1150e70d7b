//! File storage setup

use std::sync::Arc;

use anyhow::{Context, Result};
use tessera_core::Config;
use tessera_storage::{ImageFileStore, ShardedLocalStorage};

/// Open the sharded uploads root, creating it and the archive directory when missing.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn ImageFileStore>> {
    let storage = ShardedLocalStorage::new(
        config.root_uploads_dir(),
        config.deleted_dir().map(|dir| dir.to_path_buf()),
    )
    .await
    .context("Failed to initialize file storage")?;

    match storage.archive_dir() {
        Some(dir) => tracing::info!(
            root = %storage.root().display(),
            archive = %dir.display(),
            "Local storage initialized"
        ),
        None => tracing::info!(
            root = %storage.root().display(),
            "Local storage initialized, archiving disabled"
        ),
    }

    Ok(Arc::new(storage))
}
