//! Durable processing task (queue row) models.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use vidintel_core::types::{DbId, Timestamp, VideoId};

use super::decode_error;

/// Queue state of a processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Done,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Done => "done",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "running" => Ok(TaskState::Running),
            "done" => Ok(TaskState::Done),
            other => Err(format!("unknown task state '{other}'")),
        }
    }
}

/// A row from the `processing_tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingTask {
    pub id: DbId,
    pub video_id: VideoId,
    pub state: TaskState,
    /// Number of times the task has been claimed.
    pub attempts: i32,
    pub run_after: Timestamp,
    pub locked_until: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for ProcessingTask {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let state: String = row.try_get("state")?;
        let state = state.parse::<TaskState>().map_err(|e| decode_error("state", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            video_id: row.try_get("video_id")?,
            state,
            attempts: row.try_get("attempts")?,
            run_after: row.try_get("run_after")?,
            locked_until: row.try_get("locked_until")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_state_round_trips_through_text() {
        for state in [TaskState::Queued, TaskState::Running, TaskState::Done] {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
        }
        assert!("leased".parse::<TaskState>().is_err());
    }
}
