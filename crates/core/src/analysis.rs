//! Aggregation of the NLP / CV / risk sub-pipeline results.
//!
//! Each stage succeeds or fails independently. The aggregated
//! [`AnalysisReport`] decides which terminal status a video lands in and
//! produces the payload persisted as its AI result.

use serde::{Deserialize, Serialize};

use crate::lifecycle::VideoStatus;

/// Where a processing error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Nlp,
    Cv,
    Risk,
    /// Failures of the processing machinery itself (storage, retries exhausted).
    Pipeline,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Nlp => "nlp",
            Stage::Cv => "cv",
            Stage::Risk => "risk",
            Stage::Pipeline => "pipeline",
        }
    }
}

/// Classification of a processing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AnalysisFailed,
    Timeout,
    Infrastructure,
}

/// One entry of an AI result's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub stage: Stage,
    pub code: ErrorCode,
    pub message: String,
}

impl ProcessingError {
    pub fn new(stage: Stage, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            message: message.into(),
        }
    }

    /// An infrastructure failure that stopped processing altogether.
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(Stage::Pipeline, ErrorCode::Infrastructure, message)
    }
}

/// Result of a single sub-pipeline.
pub type StageResult = Result<serde_json::Value, ProcessingError>;

/// Collected results of the three sub-pipelines for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub nlp: StageResult,
    pub cv: StageResult,
    pub risk: StageResult,
}

impl AnalysisReport {
    fn stages(&self) -> [&StageResult; 3] {
        [&self.nlp, &self.cv, &self.risk]
    }

    /// Number of stages that produced a result.
    pub fn succeeded(&self) -> usize {
        self.stages().iter().filter(|r| r.is_ok()).count()
    }

    /// Terminal status implied by the stage results.
    pub fn status(&self) -> VideoStatus {
        match self.succeeded() {
            3 => VideoStatus::Completed,
            0 => VideoStatus::Failed,
            _ => VideoStatus::PartialSuccess,
        }
    }

    /// Flatten into the persisted payload. Errors keep stage order.
    pub fn to_payload(&self) -> ResultPayload {
        let errors: Vec<ProcessingError> = self
            .stages()
            .iter()
            .filter_map(|r| r.as_ref().err().cloned())
            .collect();

        ResultPayload {
            nlp_result: self.nlp.as_ref().ok().cloned(),
            cv_result: self.cv.as_ref().ok().cloned(),
            risk_result: self.risk.as_ref().ok().cloned(),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }
}

/// The data stored in an AI result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub nlp_result: Option<serde_json::Value>,
    pub cv_result: Option<serde_json::Value>,
    pub risk_result: Option<serde_json::Value>,
    pub errors: Option<Vec<ProcessingError>>,
}

/// An event reported by the background processing trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Processing has been picked up: `UPLOADED -> PROCESSING`.
    PickedUp,
    /// All sub-pipelines have reported: `PROCESSING -> terminal`.
    Analyzed(AnalysisReport),
    /// An unrecoverable error stopped processing: `PROCESSING -> FAILED`.
    Aborted(ProcessingError),
}

impl Outcome {
    /// The status this outcome moves a video into.
    pub fn target(&self) -> VideoStatus {
        match self {
            Outcome::PickedUp => VideoStatus::Processing,
            Outcome::Analyzed(report) => report.status(),
            Outcome::Aborted(_) => VideoStatus::Failed,
        }
    }

    /// The AI result attached by this outcome, if it is terminal.
    pub fn payload(&self) -> Option<ResultPayload> {
        match self {
            Outcome::PickedUp => None,
            Outcome::Analyzed(report) => Some(report.to_payload()),
            Outcome::Aborted(error) => Some(ResultPayload {
                errors: Some(vec![error.clone()]),
                ..ResultPayload::default()
            }),
        }
    }
}
