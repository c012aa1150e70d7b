//! Database setup and initialization

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tessera_core::Config;

/// SQL files under the workspace `migrations/` directory, embedded at build time.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Setup database connection pool
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );
    Ok(pool)
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(
        migrations = MIGRATOR.iter().count(),
        "Database migrations applied"
    );
    Ok(())
}
