use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Name reported by the API health endpoint.
pub const SERVICE_NAME: &str = "video-intelligence-backend";

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the entity store is reachable.
    pub db_healthy: bool,
}

/// GET /health -- returns service and store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/v1/health -- liveness only, never touches the store.
async fn service_health() -> Json<ServiceHealth> {
    Json(ServiceHealth {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// GET / -- basic service information.
async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "Video Intelligence Backend",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
}

/// The `/health` route served under `/api/v1`.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/health", get(service_health))
}
