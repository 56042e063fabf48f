//! Video entity and its create DTO.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use vidintel_core::lifecycle::{SourceType, StatusId, VideoStatus};
use vidintel_core::types::{Timestamp, VideoId};

use super::decode_error;

/// A row from the `videos` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Video {
    pub id: VideoId,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub storage_path: String,
    pub duration: Option<f64>,
    pub resolution: Option<String>,
    pub size_mb: Option<f64>,
    pub status: VideoStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for Video {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status_id: StatusId = row.try_get("status_id")?;
        let status = VideoStatus::from_id(status_id)
            .ok_or_else(|| decode_error("status_id", format!("unknown status id {status_id}")))?;

        let source_type: String = row.try_get("source_type")?;
        let source_type = source_type
            .parse::<SourceType>()
            .map_err(|e| decode_error("source_type", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            source_type,
            source_url: row.try_get("source_url")?,
            storage_path: row.try_get("storage_path")?,
            duration: row.try_get("duration")?,
            resolution: row.try_get("resolution")?,
            size_mb: row.try_get("size_mb")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for inserting a new video. Timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct CreateVideo {
    pub id: VideoId,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub storage_path: String,
    pub duration: Option<f64>,
    pub resolution: Option<String>,
    pub size_mb: Option<f64>,
    pub status: VideoStatus,
}
