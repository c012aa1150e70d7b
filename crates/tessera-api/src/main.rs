use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_api::setup;
use tessera_core::Config;

// Use mimalloc as the global allocator; image decoding churns through large buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "tessera", about = "Sharded image ingestion and storage server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Listen address, overrides HOST
    #[arg(long, global = true)]
    host: Option<String>,

    /// Listen port, overrides PORT
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Storage root holding the shard directories, overrides ROOT_UPLOADS_DIR
    #[arg(long, global = true)]
    uploads_dir: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Command {
    /// Apply pending migrations, then serve HTTP (default)
    #[default]
    Serve,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.host, cli.port, cli.uploads_dir);

    tessera_api::telemetry::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    match cli.command.unwrap_or_default() {
        Command::Serve => {
            let (_state, router) = setup::initialize_app(config.clone()).await?;
            setup::server::start_server(&config, router).await?;
        }
        Command::Migrate => {
            config.validate().context("Configuration validation failed")?;
            let pool = setup::database::setup_database(&config).await?;
            setup::database::run_migrations(&pool).await?;
            pool.close().await;
        }
    }

    Ok(())
}
