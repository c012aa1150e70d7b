//! Configuration module
//!
//! Settings are read from the environment (after loading `.env`) into [`Config`].

use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_SHARD_CAPACITY};

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_HOST: &str = "127.0.0.1";
const SERVER_PORT: u16 = 3881;
const MAX_UPLOAD_SIZE_MB: usize = 10;
const ROOT_UPLOADS_DIR: &str = "./uploads";
const DELETED_DIR: &str = "./deleted";

/// Server and pool settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub max_upload_size_bytes: usize,
}

/// Storage engine settings
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub root_uploads_dir: PathBuf,
    /// `None` disables archiving of deleted images
    pub deleted_dir: Option<PathBuf>,
    pub shard_capacity: i32,
    pub jpeg_quality: u8,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StoreConfig>);

impl Config {
    fn as_store(&self) -> &StoreConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_store().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = StoreConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_store().validate()
    }

    pub fn server_host(&self) -> &str {
        &self.as_store().base.server_host
    }

    pub fn server_port(&self) -> u16 {
        self.as_store().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_store().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_store().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_store().base.db_timeout_seconds
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_store().base.max_upload_size_bytes
    }

    pub fn database_url(&self) -> &str {
        &self.as_store().database_url
    }

    pub fn root_uploads_dir(&self) -> &Path {
        &self.as_store().root_uploads_dir
    }

    pub fn deleted_dir(&self) -> Option<&Path> {
        self.as_store().deleted_dir.as_deref()
    }

    pub fn shard_capacity(&self) -> i32 {
        self.as_store().shard_capacity
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.as_store().jpeg_quality
    }

    /// Command-line overrides take precedence over the environment.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        uploads_dir: Option<PathBuf>,
    ) -> Self {
        let store = &mut self.0;
        if let Some(host) = host {
            store.base.server_host = host;
        }
        if let Some(port) = port {
            store.base.server_port = port;
        }
        if let Some(dir) = uploads_dir {
            store.root_uploads_dir = dir;
        }
        self
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let max_upload_size_mb = env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        let base = BaseConfig {
            server_host: env::var("HOST").unwrap_or_else(|_| SERVER_HOST.to_string()),
            server_port: env_or("PORT", SERVER_PORT),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
        };

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let root_uploads_dir = PathBuf::from(
            env::var("ROOT_UPLOADS_DIR").unwrap_or_else(|_| ROOT_UPLOADS_DIR.to_string()),
        );

        // An explicitly empty DELETED_DIR turns archiving off
        let deleted_dir = match env::var("DELETED_DIR") {
            Ok(dir) if dir.trim().is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir)),
            Err(_) => Some(PathBuf::from(DELETED_DIR)),
        };

        Ok(StoreConfig {
            base,
            database_url,
            root_uploads_dir,
            deleted_dir,
            shard_capacity: env_or("SHARD_CAPACITY", DEFAULT_SHARD_CAPACITY),
            jpeg_quality: env_or("JPEG_QUALITY", DEFAULT_JPEG_QUALITY),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("DATABASE_URL must not be empty"));
        }

        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.shard_capacity <= 0 {
            return Err(anyhow::anyhow!("SHARD_CAPACITY must be greater than 0"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if self.base.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if let Some(deleted) = &self.deleted_dir {
            if deleted == &self.root_uploads_dir {
                return Err(anyhow::anyhow!(
                    "DELETED_DIR must differ from ROOT_UPLOADS_DIR"
                ));
            }
        }

        Ok(())
    }
}
