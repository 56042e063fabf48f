//! Video lifecycle service.
//!
//! The only component that creates videos or changes their status. Every
//! status change goes through [`VideoService::advance`], which checks the
//! event against the lifecycle table and persists it with a conditional
//! write, so concurrent callers can never both win.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;
use vidintel_core::analysis::{Outcome, ProcessingError};
use vidintel_core::error::CoreError;
use vidintel_core::lifecycle::{validate_source, SourceType, VideoStatus};
use vidintel_core::types::{new_id, Timestamp, VideoId};
use vidintel_db::models::video::{CreateVideo, Video};
use vidintel_db::repositories::{TaskRepo, VideoRepo};
use vidintel_db::store::{StatusChange, VideoStore};

/// Technical metadata extracted from a video, when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub duration: Option<f64>,
    pub resolution: Option<String>,
    pub size_mb: Option<f64>,
}

/// A video's current status with its AI result fields flattened in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoView {
    pub video_id: VideoId,
    pub source_type: SourceType,
    pub status: VideoStatus,
    pub storage_path: String,
    pub metadata: Option<VideoMetadata>,
    pub nlp_result: Option<serde_json::Value>,
    pub cv_result: Option<serde_json::Value>,
    pub risk_analysis: Option<serde_json::Value>,
    pub errors: Option<Vec<ProcessingError>>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSummary {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub created_at: Timestamp,
}

/// One page of the video listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoPage {
    pub items: Vec<VideoSummary>,
    pub total: i64,
}

#[derive(Clone)]
pub struct VideoService {
    videos: VideoRepo,
    tasks: TaskRepo,
    wake: Arc<Notify>,
}

impl VideoService {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self {
            videos: VideoRepo::new(Arc::clone(&store)),
            tasks: TaskRepo::new(store),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Signalled after every ingest so an idle dispatcher picks the new
    /// task up without waiting for its next poll.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    pub fn tasks(&self) -> &TaskRepo {
        &self.tasks
    }

    /// Accept a new video for processing.
    ///
    /// The video is persisted as `UPLOADED` and a processing task is queued
    /// for it. When queueing fails the video is still returned: the
    /// dispatcher's stranded-video sweep re-enqueues it later.
    pub async fn ingest(
        &self,
        source_type: SourceType,
        source_url: Option<String>,
        storage_path: String,
    ) -> Result<Video, CoreError> {
        validate_source(source_type, source_url.as_deref())?;

        let input = CreateVideo {
            id: new_id(),
            source_type,
            source_url,
            storage_path,
            duration: None,
            resolution: None,
            size_mb: None,
            status: VideoStatus::Uploaded,
        };
        let video = self.videos.create(&input).await?;

        match self.tasks.enqueue(video.id).await {
            Ok(task) => {
                tracing::debug!(video_id = %video.id, task_id = task.id, "Processing task queued");
            }
            Err(e) => {
                tracing::error!(
                    video_id = %video.id,
                    error = %e,
                    "Failed to queue processing task, leaving it to the stranded sweep",
                );
            }
        }
        self.wake.notify_one();

        tracing::info!(
            video_id = %video.id,
            source_type = %video.source_type,
            "Video accepted for processing",
        );
        Ok(video)
    }

    /// Load a video, failing with `NotFound` when it does not exist.
    pub async fn find(&self, id: VideoId) -> Result<Video, CoreError> {
        self.videos
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::video_not_found(id))
    }

    /// Current status and any available results. Always reads the store.
    pub async fn get_status(&self, id: VideoId) -> Result<VideoView, CoreError> {
        let video = self.find(id).await?;
        let result = self.videos.get_ai_result(id).await?;

        let metadata = (video.duration.is_some()
            || video.resolution.is_some()
            || video.size_mb.is_some())
        .then(|| VideoMetadata {
            duration: video.duration,
            resolution: video.resolution.clone(),
            size_mb: video.size_mb,
        });

        let (nlp_result, cv_result, risk_analysis, errors) = match result {
            Some(r) => (r.nlp_result, r.cv_result, r.risk_result, r.errors),
            None => (None, None, None, None),
        };

        Ok(VideoView {
            video_id: video.id,
            source_type: video.source_type,
            status: video.status,
            storage_path: video.storage_path,
            metadata,
            nlp_result,
            cv_result,
            risk_analysis,
            errors,
            created_at: video.created_at,
        })
    }

    /// Newest videos first, with the total count.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<VideoPage, CoreError> {
        let videos = self.videos.list(limit, offset).await?;
        let total = self.videos.count().await?;

        Ok(VideoPage {
            items: videos
                .into_iter()
                .map(|v| VideoSummary {
                    video_id: v.id,
                    status: v.status,
                    created_at: v.created_at,
                })
                .collect(),
            total,
        })
    }

    /// Apply a processing outcome to a video.
    ///
    /// Re-applying an outcome whose effect is already stored returns the
    /// stored video without writing. Any other outcome that does not fit the
    /// current status fails with `InvalidTransition`.
    pub async fn advance(&self, id: VideoId, outcome: Outcome) -> Result<Video, CoreError> {
        let target = outcome.target();
        let expected = target.predecessor().ok_or_else(|| {
            CoreError::Internal(format!("No transition leads into {target}"))
        })?;
        let payload = outcome.payload();

        let change = match &payload {
            None => self.videos.transition(id, expected, target).await?,
            Some(payload) => self.videos.finalize(id, expected, target, payload).await?,
        };

        match change {
            StatusChange::Applied(video) => {
                tracing::info!(
                    video_id = %id,
                    from = %expected,
                    to = %target,
                    "Video status advanced",
                );
                Ok(video)
            }
            StatusChange::Missing => Err(CoreError::video_not_found(id)),
            StatusChange::Stale(current) => {
                if current.status == target {
                    let already_applied = match &payload {
                        None => true,
                        Some(payload) => self
                            .videos
                            .get_ai_result(id)
                            .await?
                            .is_some_and(|stored| stored.payload() == *payload),
                    };
                    if already_applied {
                        tracing::debug!(video_id = %id, status = %target, "Outcome already applied");
                        return Ok(current);
                    }
                }

                tracing::warn!(
                    video_id = %id,
                    current = %current.status,
                    to = %target,
                    "Rejected status transition",
                );
                Err(CoreError::InvalidTransition {
                    id: id.to_string(),
                    from: current.status,
                    to: target,
                })
            }
        }
    }
}
