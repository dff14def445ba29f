use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::api::ApiError;
use crate::config::AppConfig;
use crate::storage::{Dataset, StorageConfig, StorageError};

/// Shared handler state. The current dataset is swapped wholesale on upload.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageConfig>,
    pub config: Arc<AppConfig>,
    pub dataset: Arc<RwLock<Option<Arc<Dataset>>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            storage: Arc::new(StorageConfig::new(config.data_dir.clone())),
            config: Arc::new(config),
            dataset: Arc::new(RwLock::new(None)),
        }
    }

    /// State primed with the cached upload, if there is one.
    pub fn from_cache(config: AppConfig) -> Result<Self, StorageError> {
        let mut state = Self::new(config);
        if let Some(dataset) = state.storage.load_cached()? {
            info!(
                "Serving cached upload {} ({} rows)",
                dataset.fingerprint,
                dataset.table.len()
            );
            state.dataset = Arc::new(RwLock::new(Some(Arc::new(dataset))));
        }
        Ok(state)
    }

    /// The dataset currently served.
    pub async fn current(&self) -> Result<Arc<Dataset>, ApiError> {
        self.dataset
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::NotFound("No data has been uploaded yet".to_string()))
    }

    pub async fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        *self.dataset.write().await = Some(dataset.clone());
        dataset
    }
}
