//! Background processing trigger.
//!
//! Carries one claimed task's video through `UPLOADED -> PROCESSING ->
//! terminal`. Every status write goes through [`VideoService::advance`]
//! and is retried with backoff on storage failures. A task that cannot be
//! settled is released back to the queue, so no video is left behind in a
//! non-terminal status.

use std::time::Duration;

use vidintel_core::analysis::{Outcome, ProcessingError};
use vidintel_core::error::CoreError;
use vidintel_core::lifecycle::VideoStatus;
use vidintel_core::retry::{retry_async, RetryPolicy};
use vidintel_core::types::VideoId;
use vidintel_db::models::task::ProcessingTask;
use vidintel_db::models::video::Video;

use crate::analyzer::AnalyzerSet;
use crate::env_or;
use crate::service::VideoService;

/// Tunables for processing a single task.
///
/// | Env var                 | Default |
/// |-------------------------|---------|
/// | `PIPELINE_TIMEOUT_SECS` | `60`    |
/// | `ADVANCE_MAX_RETRIES`   | `3`     |
/// | `ADVANCE_RETRY_BASE_MS` | `200`   |
/// | `TASK_MAX_ATTEMPTS`     | `5`     |
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Per-analyzer timeout.
    pub pipeline_timeout: Duration,
    /// Retry policy for status writes.
    pub advance_retry: RetryPolicy,
    /// Deliveries after which a task's video is marked `FAILED`.
    pub max_attempts: i32,
    /// Base delay before a released task becomes runnable again.
    pub release_backoff: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout: Duration::from_secs(60),
            advance_retry: RetryPolicy::default(),
            max_attempts: 5,
            release_backoff: Duration::from_secs(5),
        }
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pipeline_timeout: Duration::from_secs(env_or("PIPELINE_TIMEOUT_SECS", 60)),
            advance_retry: RetryPolicy::new(
                env_or("ADVANCE_MAX_RETRIES", defaults.advance_retry.max_retries),
                Duration::from_millis(env_or("ADVANCE_RETRY_BASE_MS", 200)),
            ),
            max_attempts: env_or("TASK_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            release_backoff: defaults.release_backoff,
        }
    }
}

/// Runs the analysis pipeline for claimed tasks.
pub struct VideoProcessor {
    service: VideoService,
    analyzers: AnalyzerSet,
    config: ProcessorConfig,
}

impl VideoProcessor {
    pub fn new(service: VideoService, analyzers: AnalyzerSet, config: ProcessorConfig) -> Self {
        Self {
            service,
            analyzers,
            config,
        }
    }

    /// Process one claimed task and settle it in the queue.
    ///
    /// The task is completed once its video is terminal (or gone), and
    /// released with backoff otherwise.
    pub async fn process(&self, task: ProcessingTask) {
        let video_id = task.video_id;
        tracing::debug!(video_id = %video_id, task_id = task.id, attempt = task.attempts, "Processing task");

        let settled = match self.run(&task).await {
            Ok(status) => {
                tracing::info!(video_id = %video_id, task_id = task.id, status = %status, "Video processing finished");
                true
            }
            Err(CoreError::NotFound { .. }) => {
                tracing::warn!(video_id = %video_id, task_id = task.id, "Video no longer exists, dropping task");
                true
            }
            Err(e) => {
                let backoff = self.release_delay(task.attempts);
                tracing::error!(
                    video_id = %video_id,
                    task_id = task.id,
                    attempt = task.attempts,
                    retry_in_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Video processing failed, releasing task",
                );
                if let Err(release_err) = self
                    .service
                    .tasks()
                    .release(task.id, backoff, &e.to_string())
                    .await
                {
                    tracing::error!(
                        video_id = %video_id,
                        task_id = task.id,
                        error = %release_err,
                        "Failed to release task, it will be redelivered when its lease expires",
                    );
                }
                false
            }
        };

        if settled {
            if let Err(e) = self.service.tasks().complete(task.id).await {
                tracing::error!(
                    video_id = %video_id,
                    task_id = task.id,
                    error = %e,
                    "Failed to complete task, it will be redelivered when its lease expires",
                );
            }
        }
    }

    fn release_delay(&self, attempts: i32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1).clamp(0, 16) as u32);
        self.config.release_backoff.saturating_mul(factor)
    }

    /// Drive the task's video to a terminal status and return that status.
    async fn run(&self, task: &ProcessingTask) -> Result<VideoStatus, CoreError> {
        let video = self.service.find(task.video_id).await?;
        if video.status.is_terminal() {
            return Ok(video.status);
        }

        if task.attempts > self.config.max_attempts {
            let message = format!(
                "Processing gave up after {} attempts",
                self.config.max_attempts
            );
            return self.abort(video.id, video.status, message).await;
        }

        let mut status = video.status;
        if status == VideoStatus::Uploaded {
            if let Some(terminal) = settled(self.advance(video.id, Outcome::PickedUp).await)? {
                return Ok(terminal);
            }
            status = VideoStatus::Processing;
        }

        let report = self
            .analyzers
            .run_all(&video.storage_path, self.config.pipeline_timeout)
            .await;
        tracing::debug!(
            video_id = %video.id,
            succeeded = report.succeeded(),
            "Analysis finished",
        );

        match self.advance(video.id, Outcome::Analyzed(report)).await {
            Ok(video) => Ok(video.status),
            Err(e) if e.is_transient() => {
                let message = format!("Could not record analysis results: {e}");
                self.abort(video.id, status, message).await
            }
            Err(e) => settled(Err(e))?.ok_or_else(|| {
                CoreError::Internal("Analysis outcome left video non-terminal".into())
            }),
        }
    }

    /// Mark a video `FAILED` with an infrastructure error.
    async fn abort(
        &self,
        id: VideoId,
        status: VideoStatus,
        message: String,
    ) -> Result<VideoStatus, CoreError> {
        tracing::warn!(video_id = %id, reason = %message, "Aborting video processing");

        if status == VideoStatus::Uploaded {
            if let Some(terminal) = settled(self.advance(id, Outcome::PickedUp).await)? {
                return Ok(terminal);
            }
        }

        let outcome = Outcome::Aborted(ProcessingError::infrastructure(message));
        match settled(self.advance(id, outcome).await)? {
            Some(status) => Ok(status),
            None => Err(CoreError::Internal(
                "Abort left video non-terminal".into(),
            )),
        }
    }

    /// `advance` with retries on storage failures.
    async fn advance(&self, id: VideoId, outcome: Outcome) -> Result<Video, CoreError> {
        let service = &self.service;
        retry_async(
            &self.config.advance_retry,
            "advance_video",
            CoreError::is_transient,
            || {
                let outcome = outcome.clone();
                async move { service.advance(id, outcome).await }
            },
        )
        .await
        .map_err(|(e, attempts)| {
            tracing::error!(video_id = %id, attempts, error = %e, "Status transition failed");
            e
        })
    }
}

/// Fold the result of an `advance` into the terminal status it produced.
///
/// A rejected transition out of a terminal status means another delivery
/// already finished the video, which settles this one too.
fn settled(result: Result<Video, CoreError>) -> Result<Option<VideoStatus>, CoreError> {
    match result {
        Ok(video) => Ok(video.status.is_terminal().then_some(video.status)),
        Err(CoreError::InvalidTransition { from, .. }) if from.is_terminal() => Ok(Some(from)),
        Err(e) => Err(e),
    }
}
