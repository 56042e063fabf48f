//! Video lifecycle state machine.
//!
//! ```text
//! UPLOADED -> PROCESSING -> COMPLETED | PARTIAL_SUCCESS | FAILED
//! ```
//!
//! `UPLOADED` and `PROCESSING` are transient; the other three are terminal
//! and admit no further transitions. Status ids match the seed order of the
//! `video_statuses` lookup table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Processing status of a video.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Uploaded = 1,
    Processing = 2,
    Completed = 3,
    PartialSuccess = 4,
    Failed = 5,
}

/// Every status, in lookup-table order.
pub const ALL_STATUSES: [VideoStatus; 5] = [
    VideoStatus::Uploaded,
    VideoStatus::Processing,
    VideoStatus::Completed,
    VideoStatus::PartialSuccess,
    VideoStatus::Failed,
];

impl VideoStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to a status.
    pub fn from_id(id: StatusId) -> Option<Self> {
        ALL_STATUSES.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "UPLOADED",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::PartialSuccess => "PARTIAL_SUCCESS",
            VideoStatus::Failed => "FAILED",
        }
    }

    /// Terminal statuses have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VideoStatus::Completed | VideoStatus::PartialSuccess | VideoStatus::Failed
        )
    }

    /// The only status a video may hold immediately before entering `self`.
    ///
    /// `None` for `Uploaded`, which is entered only at creation.
    pub fn predecessor(self) -> Option<VideoStatus> {
        match self {
            VideoStatus::Uploaded => None,
            VideoStatus::Processing => Some(VideoStatus::Uploaded),
            VideoStatus::Completed | VideoStatus::PartialSuccess | VideoStatus::Failed => {
                Some(VideoStatus::Processing)
            }
        }
    }

    /// Whether the transition table admits `self -> next`.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        next.predecessor() == Some(self)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown video status '{s}'")))
    }
}

/// How a video was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Upload,
    Url,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Upload => "UPLOAD",
            SourceType::Url => "URL",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOAD" => Ok(SourceType::Upload),
            "URL" => Ok(SourceType::Url),
            other => Err(CoreError::Validation(format!(
                "Unknown source type '{other}'. Must be one of: UPLOAD, URL"
            ))),
        }
    }
}

/// Check the `source_url` iff `URL` invariant.
pub fn validate_source(source_type: SourceType, source_url: Option<&str>) -> Result<(), CoreError> {
    match (source_type, source_url) {
        (SourceType::Url, Some(url)) if !url.trim().is_empty() => Ok(()),
        (SourceType::Url, _) => Err(CoreError::Validation(
            "source_url is required when source_type is URL".into(),
        )),
        (SourceType::Upload, None) => Ok(()),
        (SourceType::Upload, Some(_)) => Err(CoreError::Validation(
            "source_url must be absent when source_type is UPLOAD".into(),
        )),
    }
}
