//! The entity store: durable keyed storage for videos, AI results and
//! processing tasks.
//!
//! The store enforces referential integrity and the atomicity of each
//! operation, nothing more. Business rules (which transitions are legal,
//! when an AI result may be attached) live in the repositories and the
//! lifecycle service.

use std::time::Duration;

use async_trait::async_trait;
use vidintel_core::analysis::ResultPayload;
use vidintel_core::error::CoreError;
use vidintel_core::lifecycle::VideoStatus;
use vidintel_core::types::{DbId, VideoId};

use crate::models::ai_result::AiResult;
use crate::models::task::ProcessingTask;
use crate::models::video::{CreateVideo, Video};

pub mod memory;
pub mod postgres;

pub use memory::MemoryVideoStore;
pub use postgres::PgVideoStore;

/// Storage-level failure, surfaced without interpretation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

/// Result of a status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The write happened; holds the updated row.
    Applied(Video),
    /// The expected prior status did not match; holds the current row.
    Stale(Video),
    /// No video with that id exists.
    Missing,
}

/// Durable storage backend shared by every repository.
///
/// Implementations must make each method a single atomic operation. In
/// particular `set_status` with an `expected` status and `finalize` are
/// compare-and-set writes: two concurrent callers expecting the same prior
/// status can never both succeed.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Cheap liveness check of the backing storage.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_video(&self, input: &CreateVideo) -> Result<Video, StoreError>;

    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError>;

    /// Videos ordered by `created_at` descending, newest first.
    async fn list_videos(&self, limit: i64, offset: i64) -> Result<Vec<Video>, StoreError>;

    async fn count_videos(&self) -> Result<i64, StoreError>;

    /// Set `status` and refresh `updated_at`.
    ///
    /// With `expected = Some(s)` the write only applies while the stored
    /// status is `s`.
    async fn set_status(
        &self,
        id: VideoId,
        status: VideoStatus,
        expected: Option<VideoStatus>,
    ) -> Result<StatusChange, StoreError>;

    /// Conditionally move a video from `expected` to `status` and insert its
    /// AI result in the same transaction.
    async fn finalize(
        &self,
        id: VideoId,
        expected: VideoStatus,
        status: VideoStatus,
        payload: &ResultPayload,
    ) -> Result<StatusChange, StoreError>;

    async fn find_ai_result(&self, video_id: VideoId) -> Result<Option<AiResult>, StoreError>;

    /// Queue processing for a video. Re-queues a finished task; returns the
    /// existing row unchanged while one is queued or running.
    async fn enqueue_task(&self, video_id: VideoId) -> Result<ProcessingTask, StoreError>;

    /// Claim the next runnable task and lease it for `lease`.
    ///
    /// Runnable means queued with `run_after` in the past, or running with
    /// an expired lease.
    async fn claim_task(&self, lease: Duration) -> Result<Option<ProcessingTask>, StoreError>;

    async fn complete_task(&self, task_id: DbId) -> Result<(), StoreError>;

    /// Return a claimed task to the queue, runnable again after `retry_in`.
    async fn release_task(
        &self,
        task_id: DbId,
        retry_in: Duration,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Queue every non-terminal video untouched for `older_than` that has
    /// no queued or running task. Returns the number of tasks queued.
    async fn requeue_stranded(&self, older_than: Duration) -> Result<u64, StoreError>;
}
