//! Application setup and initialization
//!
//! Builds the metadata store, file store and image service from a [`Config`] and wires
//! them into the router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use tessera_core::Config;

use crate::state::AppState;

/// Initialize the entire application. Pending migrations are applied before the router
/// is built.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        uploads_dir = %config.root_uploads_dir().display(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    database::run_migrations(&pool).await?;

    let files = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, pool, files);
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
