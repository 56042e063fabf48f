//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router needed.

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use vidintel_api::error::AppError;
use vidintel_core::error::CoreError;
use vidintel_core::lifecycle::VideoStatus;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn core_errors_convert_into_core_variant() {
    let err: AppError = CoreError::video_not_found("abc").into();
    assert_matches!(
        err,
        AppError::Core(CoreError::NotFound { entity: "Video", ref id }) if id == "abc"
    );

    let err: AppError = CoreError::Validation("bad input".into()).into();
    assert_matches!(err, AppError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn not_found_returns_404() {
    let (status, json) = error_to_response(CoreError::video_not_found("abc").into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Video with id abc not found");
}

#[tokio::test]
async fn validation_returns_400() {
    let err = AppError::Core(CoreError::Validation("bad input".into()));
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "bad input");
}

#[tokio::test]
async fn bad_request_returns_400() {
    let (status, json) = error_to_response(AppError::BadRequest("broken form".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn invalid_transition_returns_409() {
    let err = AppError::Core(CoreError::InvalidTransition {
        id: "v1".into(),
        from: VideoStatus::Completed,
        to: VideoStatus::Failed,
    });
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_TRANSITION");
    assert_eq!(json["error"], "Invalid transition for video v1: COMPLETED -> FAILED");
}

#[tokio::test]
async fn persistence_error_is_sanitized() {
    let err = AppError::Core(CoreError::Persistence("connection refused at 10.0.0.3".into()));
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn internal_error_is_sanitized() {
    let err = AppError::InternalError("upload dir missing".into());
    assert_matches!(&err, AppError::InternalError(msg) if msg.contains("upload"));
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
