//! Handlers for the `/videos` resource.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::Serialize;
use vidintel_core::error::CoreError;
use vidintel_core::ingest::{resolve_source, IngestSource};
use vidintel_core::lifecycle::VideoStatus;
use vidintel_core::types::VideoId;
use vidintel_pipeline::service::{VideoPage, VideoView};

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::state::AppState;

/// Response body of a successful ingest.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub message: &'static str,
}

/// The uploaded file part of an ingest form.
struct UploadPart {
    file_name: String,
    data: Bytes,
}

/// POST /api/v1/videos
///
/// Accepts a multipart form with exactly one of a `file` field or a
/// `video_url` field. A `title` field is accepted and ignored. Uploaded
/// bytes are stored locally before the video is created.
pub async fn ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<IngestResponse>> {
    let mut upload: Option<UploadPart> = None;
    let mut video_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                // Browsers send an empty, unnamed part for an unused file input.
                if !(file_name.is_empty() && data.is_empty()) {
                    upload = Some(UploadPart { file_name, data });
                }
            }
            "video_url" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                video_url = Some(text);
            }
            _ => {} // title and unknown fields are ignored
        }
    }

    let source = resolve_source(
        upload.as_ref().map(|u| u.file_name.as_str()),
        video_url.as_deref(),
    )?;

    let source_type = source.source_type();
    let video = match source {
        IngestSource::Url(url) => {
            state
                .service
                .ingest(source_type, Some(url.clone()), url)
                .await?
        }
        IngestSource::Upload { extension, .. } => {
            let data = upload.map(|u| u.data).unwrap_or_default();
            let storage_path = state.storage.save(&extension, &data).await?;

            match state
                .service
                .ingest(source_type, None, storage_path.clone())
                .await
            {
                Ok(video) => video,
                Err(e) => {
                    state.storage.remove(&storage_path).await;
                    return Err(e.into());
                }
            }
        }
    };

    Ok(Json(IngestResponse {
        video_id: video.id,
        status: video.status,
        message: "Video accepted for processing",
    }))
}

/// GET /api/v1/videos/{video_id}
///
/// Malformed ids are reported like unknown ones.
pub async fn get_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<VideoView>> {
    let id: VideoId = video_id
        .parse()
        .map_err(|_| CoreError::video_not_found(&video_id))?;
    let view = state.service.get_status(id).await?;
    Ok(Json(view))
}

/// GET /api/v1/videos?limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<VideoPage>> {
    let page = state.service.list(params.limit(), params.offset()).await?;
    Ok(Json(page))
}
