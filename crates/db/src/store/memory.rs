//! In-process entity store.
//!
//! Every operation runs under one mutex, which gives the same atomicity as
//! the PostgreSQL store's single-statement writes. Used by tests and by
//! `STORE_BACKEND=memory` development runs; data does not survive a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use vidintel_core::analysis::ResultPayload;
use vidintel_core::lifecycle::VideoStatus;
use vidintel_core::types::{new_id, DbId, Timestamp, VideoId};

use super::{StatusChange, StoreError, VideoStore};
use crate::models::ai_result::AiResult;
use crate::models::task::{ProcessingTask, TaskState};
use crate::models::video::{CreateVideo, Video};

#[derive(Default)]
struct MemoryState {
    /// Videos with their insertion sequence, used to break `created_at` ties.
    videos: HashMap<VideoId, (u64, Video)>,
    ai_results: HashMap<VideoId, AiResult>,
    tasks: BTreeMap<DbId, ProcessingTask>,
    next_seq: u64,
    next_task_id: DbId,
}

impl MemoryState {
    fn task_for_video(&mut self, video_id: VideoId) -> Option<&mut ProcessingTask> {
        self.tasks.values_mut().find(|t| t.video_id == video_id)
    }

    fn upsert_queued_task(&mut self, video_id: VideoId, now: Timestamp) -> ProcessingTask {
        if let Some(task) = self.task_for_video(video_id) {
            if task.state == TaskState::Done {
                task.state = TaskState::Queued;
                task.run_after = now;
                task.locked_until = None;
                task.updated_at = now;
            }
            return task.clone();
        }

        self.next_task_id += 1;
        let task = ProcessingTask {
            id: self.next_task_id,
            video_id,
            state: TaskState::Queued,
            attempts: 0,
            run_after: now,
            locked_until: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

/// Entity store held entirely in memory.
#[derive(Default)]
pub struct MemoryVideoStore {
    state: Mutex<MemoryState>,
    failing_writes: AtomicU32,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` write operations fail with
    /// [`StoreError::Unavailable`], simulating a storage outage.
    pub fn inject_write_failures(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Unavailable("injected write failure".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_video(&self, input: &CreateVideo) -> Result<Video, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        if state.videos.contains_key(&input.id) {
            return Err(StoreError::Constraint(format!(
                "videos_pkey: duplicate video id {}",
                input.id
            )));
        }

        let now = Utc::now();
        let video = Video {
            id: input.id,
            source_type: input.source_type,
            source_url: input.source_url.clone(),
            storage_path: input.storage_path.clone(),
            duration: input.duration,
            resolution: input.resolution.clone(),
            size_mb: input.size_mb,
            status: input.status,
            created_at: now,
            updated_at: now,
        };

        state.next_seq += 1;
        let seq = state.next_seq;
        state.videos.insert(video.id, (seq, video.clone()));
        Ok(video)
    }

    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.videos.get(&id).map(|(_, v)| v.clone()))
    }

    async fn list_videos(&self, limit: i64, offset: i64) -> Result<Vec<Video>, StoreError> {
        let state = self.state.lock().await;

        let mut rows: Vec<&(u64, Video)> = state.videos.values().collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn count_videos(&self) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.videos.len() as i64)
    }

    async fn set_status(
        &self,
        id: VideoId,
        status: VideoStatus,
        expected: Option<VideoStatus>,
    ) -> Result<StatusChange, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        let Some((_, video)) = state.videos.get_mut(&id) else {
            return Ok(StatusChange::Missing);
        };

        if expected.is_some_and(|e| e != video.status) {
            return Ok(StatusChange::Stale(video.clone()));
        }

        video.status = status;
        video.updated_at = Utc::now();
        Ok(StatusChange::Applied(video.clone()))
    }

    async fn finalize(
        &self,
        id: VideoId,
        expected: VideoStatus,
        status: VideoStatus,
        payload: &ResultPayload,
    ) -> Result<StatusChange, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some((_, video)) = state.videos.get_mut(&id) else {
            return Ok(StatusChange::Missing);
        };

        if video.status != expected {
            return Ok(StatusChange::Stale(video.clone()));
        }

        if state.ai_results.contains_key(&id) {
            return Err(StoreError::Constraint(format!(
                "uq_ai_results_video_id: video {id} already has an AI result"
            )));
        }

        let now = Utc::now();
        video.status = status;
        video.updated_at = now;

        state.ai_results.insert(
            id,
            AiResult {
                id: new_id(),
                video_id: id,
                nlp_result: payload.nlp_result.clone(),
                cv_result: payload.cv_result.clone(),
                risk_result: payload.risk_result.clone(),
                errors: payload.errors.clone(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(StatusChange::Applied(video.clone()))
    }

    async fn find_ai_result(&self, video_id: VideoId) -> Result<Option<AiResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.ai_results.get(&video_id).cloned())
    }

    async fn enqueue_task(&self, video_id: VideoId) -> Result<ProcessingTask, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        if !state.videos.contains_key(&video_id) {
            return Err(StoreError::Constraint(format!(
                "processing_tasks_video_id_fkey: video {video_id} does not exist"
            )));
        }

        Ok(state.upsert_queued_task(video_id, Utc::now()))
    }

    async fn claim_task(&self, lease: Duration) -> Result<Option<ProcessingTask>, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let next = state
            .tasks
            .values_mut()
            .filter(|t| match t.state {
                TaskState::Queued => t.run_after <= now,
                TaskState::Running => t.locked_until.is_some_and(|until| until < now),
                TaskState::Done => false,
            })
            .min_by_key(|t| (t.run_after, t.id));

        Ok(next.map(|task| {
            task.state = TaskState::Running;
            task.attempts += 1;
            task.locked_until = Some(now + to_delta(lease));
            task.updated_at = now;
            task.clone()
        }))
    }

    async fn complete_task(&self, task_id: DbId) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;

        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.state = TaskState::Done;
            task.locked_until = None;
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn release_task(
        &self,
        task_id: DbId,
        retry_in: Duration,
        error: &str,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.state = TaskState::Queued;
            task.run_after = now + to_delta(retry_in);
            task.locked_until = None;
            task.last_error = Some(error.to_string());
            task.updated_at = now;
        }
        Ok(())
    }

    async fn requeue_stranded(&self, older_than: Duration) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let cutoff = now - to_delta(older_than);

        let stranded: Vec<VideoId> = state
            .videos
            .values()
            .map(|(_, v)| v)
            .filter(|v| !v.status.is_terminal() && v.updated_at < cutoff)
            .map(|v| v.id)
            .collect();

        let mut queued = 0;
        for video_id in stranded {
            let live = state
                .tasks
                .values()
                .any(|t| t.video_id == video_id && t.state != TaskState::Done);
            if !live {
                state.upsert_queued_task(video_id, now);
                queued += 1;
            }
        }
        Ok(queued)
    }
}
