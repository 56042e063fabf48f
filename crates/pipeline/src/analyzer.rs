//! Analysis sub-pipeline contract and clients.
//!
//! Each sub-pipeline exposes `analyze(storage_path) -> result | error`.
//! The models themselves run elsewhere; [`HttpAnalyzer`] calls a remote
//! service and [`PlaceholderAnalyzer`] stands in when none is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use vidintel_core::analysis::{AnalysisReport, ErrorCode, ProcessingError, Stage, StageResult};

/// Failure of a single analysis call.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed analyzer response: {0}")]
    Decode(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl AnalysisError {
    fn code(&self) -> ErrorCode {
        match self {
            AnalysisError::Timeout(_) => ErrorCode::Timeout,
            _ => ErrorCode::AnalysisFailed,
        }
    }
}

/// One analysis sub-pipeline.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, storage_path: &str) -> Result<serde_json::Value, AnalysisError>;
}

/// Calls a remote analysis service with `POST {"storage_path": ...}` and
/// expects a JSON result body.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, storage_path: &str) -> Result<serde_json::Value, AnalysisError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "storage_path": storage_path }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::Decode(e.to_string()))
    }
}

/// Returns a fixed, clearly-marked payload without doing any analysis.
pub struct PlaceholderAnalyzer {
    stage: Stage,
}

impl PlaceholderAnalyzer {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Analyzer for PlaceholderAnalyzer {
    async fn analyze(&self, storage_path: &str) -> Result<serde_json::Value, AnalysisError> {
        Ok(json!({
            "stage": self.stage.as_str(),
            "placeholder": true,
            "storage_path": storage_path,
        }))
    }
}

/// The three sub-pipelines a video is run through.
#[derive(Clone)]
pub struct AnalyzerSet {
    pub nlp: Arc<dyn Analyzer>,
    pub cv: Arc<dyn Analyzer>,
    pub risk: Arc<dyn Analyzer>,
}

impl AnalyzerSet {
    /// Build from `NLP_ANALYZER_URL`, `CV_ANALYZER_URL` and
    /// `RISK_ANALYZER_URL`. Unset variables fall back to placeholders.
    pub fn from_env() -> Self {
        let client = reqwest::Client::new();
        let build = |var: &str, stage: Stage| -> Arc<dyn Analyzer> {
            match std::env::var(var) {
                Ok(url) if !url.trim().is_empty() => {
                    tracing::info!(stage = stage.as_str(), %url, "Using remote analyzer");
                    Arc::new(HttpAnalyzer::new(client.clone(), url))
                }
                _ => {
                    tracing::warn!(
                        stage = stage.as_str(),
                        "{var} not set, using placeholder analyzer"
                    );
                    Arc::new(PlaceholderAnalyzer::new(stage))
                }
            }
        };

        Self {
            nlp: build("NLP_ANALYZER_URL", Stage::Nlp),
            cv: build("CV_ANALYZER_URL", Stage::Cv),
            risk: build("RISK_ANALYZER_URL", Stage::Risk),
        }
    }

    /// Placeholder analyzers for every stage.
    pub fn placeholders() -> Self {
        Self {
            nlp: Arc::new(PlaceholderAnalyzer::new(Stage::Nlp)),
            cv: Arc::new(PlaceholderAnalyzer::new(Stage::Cv)),
            risk: Arc::new(PlaceholderAnalyzer::new(Stage::Risk)),
        }
    }

    /// Run all three sub-pipelines concurrently.
    ///
    /// Every stage gets its own `timeout`. A failed or timed-out stage is
    /// recorded in the report and never cancels its siblings.
    pub async fn run_all(&self, storage_path: &str, timeout: Duration) -> AnalysisReport {
        let (nlp, cv, risk) = tokio::join!(
            run_stage(Stage::Nlp, self.nlp.as_ref(), storage_path, timeout),
            run_stage(Stage::Cv, self.cv.as_ref(), storage_path, timeout),
            run_stage(Stage::Risk, self.risk.as_ref(), storage_path, timeout),
        );
        AnalysisReport { nlp, cv, risk }
    }
}

async fn run_stage(
    stage: Stage,
    analyzer: &dyn Analyzer,
    storage_path: &str,
    timeout: Duration,
) -> StageResult {
    let result = match tokio::time::timeout(timeout, analyzer.analyze(storage_path)).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::Timeout(timeout)),
    };

    result.map_err(|e| {
        tracing::warn!(stage = stage.as_str(), error = %e, "Analysis stage failed");
        ProcessingError::new(stage, e.code(), format!("{} analysis: {e}", stage.as_str()))
    })
}
