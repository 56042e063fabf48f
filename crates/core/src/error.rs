use crate::lifecycle::VideoStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition for video {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: VideoStatus,
        to: VideoStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing video.
    pub fn video_not_found(id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: "Video",
            id: id.to_string(),
        }
    }

    /// Whether a caller may retry the operation that produced this error.
    ///
    /// Only storage failures are transient; validation, lookup and state
    /// machine errors will fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_transition() {
        let err = CoreError::InvalidTransition {
            id: "abc".into(),
            from: VideoStatus::Completed,
            to: VideoStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for video abc: COMPLETED -> PROCESSING"
        );
    }

    #[test]
    fn only_persistence_errors_are_transient() {
        assert!(CoreError::Persistence("down".into()).is_transient());
        assert!(!CoreError::Validation("bad".into()).is_transient());
        assert!(!CoreError::video_not_found("x").is_transient());
    }
}
