use std::sync::Arc;

use tessera_core::Config;
use tessera_services::ImageStore;

/// Shared by every handler behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub fn new(config: Config, images: Arc<ImageStore>) -> Self {
        Self { config, images }
    }
}
