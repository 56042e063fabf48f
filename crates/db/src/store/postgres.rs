//! PostgreSQL entity store.
//!
//! Status writes are single `UPDATE ... WHERE status_id = $expected`
//! statements; task claims use `SELECT FOR UPDATE SKIP LOCKED` so several
//! dispatchers can share one queue.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::types::Json;
use vidintel_core::analysis::ResultPayload;
use vidintel_core::lifecycle::VideoStatus;
use vidintel_core::types::{new_id, DbId, VideoId};

use super::{StatusChange, StoreError, VideoStore};
use crate::models::ai_result::AiResult;
use crate::models::task::{ProcessingTask, TaskState};
use crate::models::video::{CreateVideo, Video};
use crate::DbPool;

/// Column list for `videos` queries.
const VIDEO_COLUMNS: &str = "\
    id, source_type, source_url, storage_path, \
    duration, resolution, size_mb, status_id, \
    created_at, updated_at";

/// Column list for `ai_results` queries.
const AI_RESULT_COLUMNS: &str = "\
    id, video_id, nlp_result, cv_result, risk_result, errors, \
    created_at, updated_at";

/// Column list for `processing_tasks` queries.
const TASK_COLUMNS: &str = "\
    id, video_id, state, attempts, run_after, locked_until, last_error, \
    created_at, updated_at";

/// PostgreSQL SQLSTATE codes reported as constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Entity store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgVideoStore {
    pool: DbPool,
}

impl PgVideoStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Classify a failed conditional write as stale or missing.
    async fn stale_or_missing(&self, id: VideoId) -> Result<StatusChange, StoreError> {
        Ok(match self.find_video(id).await? {
            Some(current) => StatusChange::Stale(current),
            None => StatusChange::Missing,
        })
    }
}

/// Map constraint violations to [`StoreError::Constraint`].
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        if matches!(
            code.as_deref(),
            Some(UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION | CHECK_VIOLATION)
        ) {
            let constraint = db_err.constraint().unwrap_or("unknown");
            return StoreError::Constraint(format!("{constraint}: {}", db_err.message()));
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn insert_video(&self, input: &CreateVideo) -> Result<Video, StoreError> {
        let query = format!(
            "INSERT INTO videos \
                 (id, source_type, source_url, storage_path, duration, resolution, size_mb, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {VIDEO_COLUMNS}"
        );
        sqlx::query_as::<_, Video>(&query)
            .bind(input.id)
            .bind(input.source_type.as_str())
            .bind(&input.source_url)
            .bind(&input.storage_path)
            .bind(input.duration)
            .bind(&input.resolution)
            .bind(input.size_mb)
            .bind(input.status.id())
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_video(&self, id: VideoId) -> Result<Option<Video>, StoreError> {
        let query = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1");
        Ok(sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_videos(&self, limit: i64, offset: i64) -> Result<Vec<Video>, StoreError> {
        let query = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        Ok(sqlx::query_as::<_, Video>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_videos(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn set_status(
        &self,
        id: VideoId,
        status: VideoStatus,
        expected: Option<VideoStatus>,
    ) -> Result<StatusChange, StoreError> {
        // `$3 IS NULL` turns the guard off for unconditional writes.
        let query = format!(
            "UPDATE videos SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND ($3::SMALLINT IS NULL OR status_id = $3) \
             RETURNING {VIDEO_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .bind(status.id())
            .bind(expected.map(VideoStatus::id))
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(video) => Ok(StatusChange::Applied(video)),
            None => self.stale_or_missing(id).await,
        }
    }

    async fn finalize(
        &self,
        id: VideoId,
        expected: VideoStatus,
        status: VideoStatus,
        payload: &ResultPayload,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "UPDATE videos SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {VIDEO_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Video>(&query)
            .bind(id)
            .bind(status.id())
            .bind(expected.id())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(video) = updated else {
            tx.rollback().await?;
            return self.stale_or_missing(id).await;
        };

        sqlx::query(
            "INSERT INTO ai_results (id, video_id, nlp_result, cv_result, risk_result, errors) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(new_id())
        .bind(id)
        .bind(&payload.nlp_result)
        .bind(&payload.cv_result)
        .bind(&payload.risk_result)
        .bind(payload.errors.as_ref().map(Json))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await?;
        Ok(StatusChange::Applied(video))
    }

    async fn find_ai_result(&self, video_id: VideoId) -> Result<Option<AiResult>, StoreError> {
        let query = format!("SELECT {AI_RESULT_COLUMNS} FROM ai_results WHERE video_id = $1");
        Ok(sqlx::query_as::<_, AiResult>(&query)
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn enqueue_task(&self, video_id: VideoId) -> Result<ProcessingTask, StoreError> {
        let query = format!(
            "INSERT INTO processing_tasks (video_id, state) VALUES ($1, $2) \
             ON CONFLICT (video_id) DO UPDATE \
                 SET state = EXCLUDED.state, run_after = NOW(), locked_until = NULL, \
                     updated_at = NOW() \
                 WHERE processing_tasks.state = $3 \
             RETURNING {TASK_COLUMNS}"
        );
        let queued = sqlx::query_as::<_, ProcessingTask>(&query)
            .bind(video_id)
            .bind(TaskState::Queued.as_str())
            .bind(TaskState::Done.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        if let Some(task) = queued {
            return Ok(task);
        }

        // Conflict with a live task: report it unchanged.
        let query = format!("SELECT {TASK_COLUMNS} FROM processing_tasks WHERE video_id = $1");
        Ok(sqlx::query_as::<_, ProcessingTask>(&query)
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn claim_task(&self, lease: Duration) -> Result<Option<ProcessingTask>, StoreError> {
        let query = format!(
            "UPDATE processing_tasks \
             SET state = $1, attempts = attempts + 1, \
                 locked_until = NOW() + make_interval(secs => $3), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM processing_tasks \
                 WHERE (state = $2 AND run_after <= NOW()) \
                    OR (state = $1 AND locked_until < NOW()) \
                 ORDER BY run_after ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {TASK_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ProcessingTask>(&query)
            .bind(TaskState::Running.as_str())
            .bind(TaskState::Queued.as_str())
            .bind(lease.as_secs_f64())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn complete_task(&self, task_id: DbId) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE processing_tasks \
             SET state = $2, locked_until = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(TaskState::Done.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_task(
        &self,
        task_id: DbId,
        retry_in: Duration,
        error: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE processing_tasks \
             SET state = $2, run_after = NOW() + make_interval(secs => $3), \
                 locked_until = NULL, last_error = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(TaskState::Queued.as_str())
        .bind(retry_in.as_secs_f64())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn requeue_stranded(&self, older_than: Duration) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO processing_tasks (video_id, state) \
             SELECT v.id, $1 FROM videos v \
             WHERE v.status_id IN ($2, $3) \
               AND v.updated_at < NOW() - make_interval(secs => $4) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM processing_tasks t \
                   WHERE t.video_id = v.id AND t.state IN ($1, $5) \
               ) \
             ON CONFLICT (video_id) DO UPDATE \
                 SET state = EXCLUDED.state, run_after = NOW(), locked_until = NULL, \
                     updated_at = NOW()",
        )
        .bind(TaskState::Queued.as_str())
        .bind(VideoStatus::Uploaded.id())
        .bind(VideoStatus::Processing.id())
        .bind(older_than.as_secs_f64())
        .bind(TaskState::Running.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
