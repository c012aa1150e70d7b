//! Test helpers: build AppState and router over the in-memory metadata store.
//!
//! Run from workspace root: `cargo test -p tessera-api --test api_test`. Files go to a
//! temporary directory; the real JPEG codec is used.

pub mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use axum_test::TestServer;
use tempfile::TempDir;
use tessera_api::constants;
use tessera_api::setup::routes;
use tessera_api::state::AppState;
use tessera_core::{BaseConfig, Config, IdGenerator, StoreConfig};
use tessera_db::MemoryMetadataStore;
use tessera_processing::{ImageCrateCodec, VariantPipeline};
use tessera_services::ImageStore;
use tessera_storage::ShardedLocalStorage;

/// JSON API path (e.g. `/api/images`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus the stores behind it.
pub struct TestApp {
    pub server: TestServer,
    pub metadata: MemoryMetadataStore,
    pub uploads: PathBuf,
    pub archive: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Path of a stored file under the uploads root.
    pub fn file(&self, shard_id: i64, name: &str) -> PathBuf {
        self.uploads.join(shard_id.to_string()).join(name)
    }
}

pub fn create_test_config(temp_dir: &TempDir, shard_capacity: i32, max_upload_mb: usize) -> Config {
    Config(Box::new(StoreConfig {
        base: BaseConfig {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            db_max_connections: 1,
            db_timeout_seconds: 5,
            environment: "test".to_string(),
            max_upload_size_bytes: max_upload_mb * 1024 * 1024,
        },
        database_url: "postgres://unused".to_string(),
        root_uploads_dir: temp_dir.path().join("uploads"),
        deleted_dir: Some(temp_dir.path().join("deleted")),
        shard_capacity,
        jpeg_quality: 85,
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(4000, 10).await
}

/// Setup test app with isolated in-memory metadata and local storage.
pub async fn setup_test_app_with(shard_capacity: i32, max_upload_mb: usize) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(&temp_dir, shard_capacity, max_upload_mb);
    let uploads = config.root_uploads_dir().to_path_buf();
    let archive = temp_dir.path().join("deleted");

    let files = Arc::new(
        ShardedLocalStorage::new(&uploads, Some(archive.clone()))
            .await
            .expect("Failed to create local storage"),
    );
    let metadata = MemoryMetadataStore::new();
    let pipeline = Arc::new(VariantPipeline::new(Arc::new(ImageCrateCodec::new(
        config.jpeg_quality(),
    ))));
    let images = ImageStore::new(
        Arc::new(metadata.clone()),
        files,
        pipeline,
        Arc::new(IdGenerator::from_seed(7)),
        config.shard_capacity(),
    );

    let state = Arc::new(AppState::new(config.clone(), Arc::new(images)));
    let router = routes::setup_routes(&config, state);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        metadata,
        uploads,
        archive,
        _temp_dir: temp_dir,
    }
}
