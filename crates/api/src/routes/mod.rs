pub mod health;
pub mod videos;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /health                 service liveness (no store access)
/// /videos                 ingest (POST multipart), list (GET)
/// /videos/{video_id}      status and results (GET)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .merge(health::api_router())
        .nest("/videos", videos::router(config.max_upload_mb))
}
