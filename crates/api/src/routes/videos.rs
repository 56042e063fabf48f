//! Route definitions for video ingest and status.
//!
//! Mounted at `/videos`.
//!
//! ```text
//! POST /                ingest      (multipart: file | video_url, optional title)
//! GET  /                list        (?limit=&offset=)
//! GET  /{video_id}      get_status
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

pub fn router(max_upload_mb: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(videos::list)
                .post(videos::ingest)
                .layer(DefaultBodyLimit::max(max_upload_mb.saturating_mul(1024 * 1024))),
        )
        .route("/{video_id}", get(videos::get_status))
}
