//! Service initialization

use std::sync::Arc;

use sqlx::PgPool;
use tessera_core::{Config, IdGenerator};
use tessera_db::PgMetadataStore;
use tessera_processing::{ImageCrateCodec, VariantPipeline};
use tessera_services::ImageStore;
use tessera_storage::ImageFileStore;

use crate::state::AppState;

/// Build the image service over PostgreSQL metadata and the given file store.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    files: Arc<dyn ImageFileStore>,
) -> Arc<AppState> {
    let metadata = Arc::new(PgMetadataStore::new(pool));
    let codec = Arc::new(ImageCrateCodec::new(config.jpeg_quality()));
    let pipeline = Arc::new(VariantPipeline::new(codec));

    let images = ImageStore::new(
        metadata,
        files,
        pipeline,
        Arc::new(IdGenerator::from_entropy()),
        config.shard_capacity(),
    );
    tracing::info!(
        shard_capacity = config.shard_capacity(),
        jpeg_quality = config.jpeg_quality(),
        "Image service initialized"
    );

    Arc::new(AppState::new(config.clone(), Arc::new(images)))
}
