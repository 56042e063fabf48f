//! HTTP-level integration tests for the `/api/v1/videos` endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_multipart, Part};
use vidintel_core::types::new_id;

const VIDEO_URL: &str = "https://cdn.example.com/clips/launch.mp4";

async fn ingest_url(app: &common::TestApp) -> String {
    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::Text("video_url", VIDEO_URL)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["video_id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn url_ingest_returns_uploaded() {
    let app = build_test_app();
    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[
            Part::Text("video_url", VIDEO_URL),
            Part::Text("title", "Launch video"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "UPLOADED");
    assert_eq!(json["message"], "Video accepted for processing");

    let id = json["video_id"].as_str().unwrap();
    let json = body_json(get(&app.router, &format!("/api/v1/videos/{id}")).await).await;
    assert!(
        json["status"] == "UPLOADED" || json["status"] == "PROCESSING",
        "unexpected status {}",
        json["status"]
    );
    assert_eq!(json["source_type"], "URL");
    assert_eq!(json["storage_path"], VIDEO_URL);
}

#[tokio::test]
async fn file_upload_is_stored_and_ingested() {
    let app = build_test_app();
    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::File {
            name: "file",
            file_name: "holiday.MP4",
            data: b"not really a video",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let id = body_json(response).await["video_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(app.stored_uploads(), 1);

    let json = body_json(get(&app.router, &format!("/api/v1/videos/{id}")).await).await;
    assert_eq!(json["source_type"], "UPLOAD");
    let storage_path = json["storage_path"].as_str().unwrap();
    assert!(storage_path.ends_with(".mp4"));
    assert_eq!(std::fs::read(storage_path).unwrap(), b"not really a video");
}

#[tokio::test]
async fn both_file_and_url_is_rejected() {
    let app = build_test_app();
    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[
            Part::File {
                name: "file",
                file_name: "clip.mp4",
                data: b"bytes",
            },
            Part::Text("video_url", VIDEO_URL),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Provide only one of file or video_url");

    let list = body_json(get(&app.router, "/api/v1/videos").await).await;
    assert_eq!(list["total"], 0);
    assert_eq!(app.stored_uploads(), 0);
}

#[tokio::test]
async fn neither_file_nor_url_is_rejected() {
    let app = build_test_app();
    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::Text("title", "no source")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Either file or video_url must be provided");
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let list = body_json(get(&app.router, "/api/v1/videos").await).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn invalid_url_and_unsupported_extension_are_rejected() {
    let app = build_test_app();

    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::Text("video_url", "ftp://example.com/a.mp4")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::File {
            name: "file",
            file_name: "notes.txt",
            data: b"hello",
        }],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_uploads(), 0);
}

#[tokio::test]
async fn failed_persist_leaves_no_orphan_upload() {
    let app = build_test_app();
    app.store.inject_write_failures(1);

    let response = post_multipart(
        &app.router,
        "/api/v1/videos",
        &[Part::File {
            name: "file",
            file_name: "clip.webm",
            data: b"bytes",
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "An internal error occurred");
    assert_eq!(app.stored_uploads(), 0);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_video_returns_404() {
    let app = build_test_app();

    let response = get(&app.router, &format!("/api/v1/videos/{}", new_id())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = get(&app.router, "/api/v1/videos/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn processing_reaches_terminal_status_with_results() {
    let app = build_test_app();
    let id = ingest_url(&app).await;

    assert_eq!(app.process_all().await, 1);

    let response = get(&app.router, &format!("/api/v1/videos/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "COMPLETED");
    assert!(json["errors"].is_null());
    assert_eq!(json["nlp_result"]["storage_path"], VIDEO_URL);
    assert!(json["cv_result"].is_object());
    assert!(json["risk_analysis"].is_object());
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_newest_first_and_paginated() {
    let app = build_test_app();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(ingest_url(&app).await);
    }

    let json = body_json(get(&app.router, "/api/v1/videos?limit=2").await).await;
    assert_eq!(json["total"], 3);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["video_id"], ids[2].as_str());
    assert_eq!(items[1]["video_id"], ids[1].as_str());
    assert_eq!(items[0]["status"], "UPLOADED");

    let json = body_json(get(&app.router, "/api/v1/videos?limit=2&offset=2").await).await;
    assert_eq!(json["items"].as_array().unwrap().len(), 1);

    let json = body_json(get(&app.router, "/api/v1/videos?offset=50").await).await;
    assert!(json["items"].as_array().unwrap().is_empty());
    assert_eq!(json["total"], 3);
}
