//! Aggregated analysis output attached to a video in a terminal status.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};
use vidintel_core::analysis::{ProcessingError, ResultPayload};
use vidintel_core::types::{Timestamp, VideoId};

/// A row from the `ai_results` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiResult {
    pub id: VideoId,
    pub video_id: VideoId,
    pub nlp_result: Option<serde_json::Value>,
    pub cv_result: Option<serde_json::Value>,
    pub risk_result: Option<serde_json::Value>,
    pub errors: Option<Vec<ProcessingError>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AiResult {
    /// The stored payload, for comparison against a re-applied outcome.
    pub fn payload(&self) -> ResultPayload {
        ResultPayload {
            nlp_result: self.nlp_result.clone(),
            cv_result: self.cv_result.clone(),
            risk_result: self.risk_result.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<'r> FromRow<'r, PgRow> for AiResult {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let errors: Option<Json<Vec<ProcessingError>>> = row.try_get("errors")?;

        Ok(Self {
            id: row.try_get("id")?,
            video_id: row.try_get("video_id")?,
            nlp_result: row.try_get("nlp_result")?,
            cv_result: row.try_get("cv_result")?,
            risk_result: row.try_get("risk_result")?,
            errors: errors.map(|Json(e)| e),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
