#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use vidintel_api::config::{ServerConfig, StoreBackend};
use vidintel_api::router::build_app_router;
use vidintel_api::state::AppState;
use vidintel_db::store::MemoryVideoStore;
use vidintel_pipeline::analyzer::AnalyzerSet;
use vidintel_pipeline::dispatcher::{DispatcherConfig, TaskDispatcher};
use vidintel_pipeline::processor::{ProcessorConfig, VideoProcessor};

const BOUNDARY: &str = "vidintel-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_mb: 16,
        store_backend: StoreBackend::Memory,
        embedded_worker: false,
    }
}

/// A router over a fresh in-memory store, plus handles to drive it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryVideoStore>,
    pub uploads: TempDir,
}

impl TestApp {
    /// Process every queued video to completion with placeholder analyzers.
    pub async fn process_all(&self) -> usize {
        let processor = VideoProcessor::new(
            self.state.service.clone(),
            AnalyzerSet::placeholders(),
            ProcessorConfig::default(),
        );
        TaskDispatcher::new(
            self.state.service.tasks().clone(),
            Arc::new(processor),
            self.state.service.wake_handle(),
            DispatcherConfig::default(),
        )
        .drain()
        .await
    }

    /// Number of files written to the upload directory.
    pub fn stored_uploads(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build the full application router with all middleware layers, backed by
/// an in-memory store and a temporary upload directory.
pub fn build_test_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryVideoStore::new());
    let state = AppState::new(store.clone(), test_config(uploads.path()));

    TestApp {
        router: build_app_router(state.clone()),
        state,
        store,
        uploads,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: &Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
