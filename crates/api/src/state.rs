use std::sync::Arc;

use vidintel_db::store::VideoStore;
use vidintel_pipeline::service::VideoService;

use crate::config::ServerConfig;
use crate::storage::LocalStorage;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Video lifecycle service; the only path handlers use to touch videos.
    pub service: VideoService,
    /// Entity store handle, used for health checks.
    pub store: Arc<dyn VideoStore>,
    /// Where uploaded video bytes are written.
    pub storage: Arc<LocalStorage>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn VideoStore>, config: ServerConfig) -> Self {
        Self {
            service: VideoService::new(Arc::clone(&store)),
            storage: Arc::new(LocalStorage::new(config.upload_dir.clone())),
            store,
            config: Arc::new(config),
        }
    }
}
