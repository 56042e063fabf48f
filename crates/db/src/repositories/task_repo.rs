//! Repository for the durable processing-task queue.

use std::sync::Arc;
use std::time::Duration;

use vidintel_core::error::CoreError;
use vidintel_core::types::{DbId, VideoId};

use crate::models::task::ProcessingTask;
use crate::store::VideoStore;

/// Queue operations over `processing_tasks`.
#[derive(Clone)]
pub struct TaskRepo {
    store: Arc<dyn VideoStore>,
}

impl TaskRepo {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    /// Schedule processing for a video. At most one live task exists per video.
    pub async fn enqueue(&self, video_id: VideoId) -> Result<ProcessingTask, CoreError> {
        Ok(self.store.enqueue_task(video_id).await?)
    }

    /// Claim the next runnable task, leasing it for `lease`.
    pub async fn claim(&self, lease: Duration) -> Result<Option<ProcessingTask>, CoreError> {
        Ok(self.store.claim_task(lease).await?)
    }

    pub async fn complete(&self, task_id: DbId) -> Result<(), CoreError> {
        Ok(self.store.complete_task(task_id).await?)
    }

    /// Put a claimed task back in the queue, runnable after `retry_in`.
    pub async fn release(
        &self,
        task_id: DbId,
        retry_in: Duration,
        error: &str,
    ) -> Result<(), CoreError> {
        Ok(self.store.release_task(task_id, retry_in, error).await?)
    }

    /// Queue non-terminal videos that have no live task.
    pub async fn requeue_stranded(&self, older_than: Duration) -> Result<u64, CoreError> {
        Ok(self.store.requeue_stranded(older_than).await?)
    }
}
