use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::QueryClient;
use crate::storage::StorageClient;

/// Long-lived handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn QueryClient>,
    pub storage: Arc<dyn StorageClient>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Arc<dyn QueryClient>, storage: Arc<dyn StorageClient>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            config: Arc::new(config),
        }
    }
}
