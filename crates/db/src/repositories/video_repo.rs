//! Repository for videos and their AI results.
//!
//! Checks the shape of what is written (ids, the `source_url` iff `URL`
//! invariant, pagination bounds) but never whether a status change is legal
//! for the lifecycle; that is the lifecycle service's job.

use std::sync::Arc;

use vidintel_core::analysis::ResultPayload;
use vidintel_core::error::CoreError;
use vidintel_core::lifecycle::{validate_source, VideoStatus};
use vidintel_core::types::VideoId;

use crate::models::ai_result::AiResult;
use crate::models::video::{CreateVideo, Video};
use crate::store::{StatusChange, VideoStore};

/// Provides CRUD and status-write operations for videos.
#[derive(Clone)]
pub struct VideoRepo {
    store: Arc<dyn VideoStore>,
}

impl VideoRepo {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    /// Persist a new video.
    pub async fn create(&self, input: &CreateVideo) -> Result<Video, CoreError> {
        if input.id.is_nil() {
            return Err(CoreError::Validation("Video id must not be nil".into()));
        }
        if input.storage_path.trim().is_empty() {
            return Err(CoreError::Validation("storage_path must not be empty".into()));
        }
        validate_source(input.source_type, input.source_url.as_deref())?;

        let video = self.store.insert_video(input).await?;
        tracing::debug!(
            video_id = %video.id,
            source_type = %video.source_type,
            status = %video.status,
            "Video persisted",
        );
        Ok(video)
    }

    /// Find a video by id. Unknown ids yield `None`.
    pub async fn get_by_id(&self, id: VideoId) -> Result<Option<Video>, CoreError> {
        Ok(self.store.find_video(id).await?)
    }

    /// List videos, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Video>, CoreError> {
        if limit < 0 || offset < 0 {
            return Err(CoreError::Validation(
                "limit and offset must be non-negative".into(),
            ));
        }
        Ok(self.store.list_videos(limit, offset).await?)
    }

    /// Total number of stored videos.
    pub async fn count(&self) -> Result<i64, CoreError> {
        Ok(self.store.count_videos().await?)
    }

    /// Unconditionally set a video's status in one atomic write.
    ///
    /// Returns `None` when the id is unknown. Callers that need the
    /// lifecycle guarantees use [`VideoRepo::transition`] instead.
    pub async fn update_status(
        &self,
        id: VideoId,
        status: VideoStatus,
    ) -> Result<Option<Video>, CoreError> {
        match self.store.set_status(id, status, None).await? {
            StatusChange::Applied(video) | StatusChange::Stale(video) => Ok(Some(video)),
            StatusChange::Missing => Ok(None),
        }
    }

    /// Set `status` only while the stored status is still `expected`.
    pub async fn transition(
        &self,
        id: VideoId,
        expected: VideoStatus,
        status: VideoStatus,
    ) -> Result<StatusChange, CoreError> {
        Ok(self.store.set_status(id, status, Some(expected)).await?)
    }

    /// Move a video from `expected` into `status` and attach its AI result
    /// atomically.
    pub async fn finalize(
        &self,
        id: VideoId,
        expected: VideoStatus,
        status: VideoStatus,
        payload: &ResultPayload,
    ) -> Result<StatusChange, CoreError> {
        Ok(self.store.finalize(id, expected, status, payload).await?)
    }

    pub async fn get_ai_result(&self, video_id: VideoId) -> Result<Option<AiResult>, CoreError> {
        Ok(self.store.find_ai_result(video_id).await?)
    }
}
