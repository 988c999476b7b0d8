use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ProblemLimits, SubmissionId, SubmissionStatus, TestCase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCode {
    /// A source file saved by the caller. The engine reads it and judges a private copy.
    Path(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeRequest {
    pub submission_id: SubmissionId,
    pub source: SourceCode,
    pub test_cases: Vec<TestCase>,
    pub limits: ProblemLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub index: usize,
    pub status: SubmissionStatus,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub status: SubmissionStatus,
    pub message: String,
    pub cases: Vec<CaseReport>,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
}

impl JudgeReport {
    pub fn verdict(status: SubmissionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cases: Vec::new(),
            runtime_ms: None,
            memory_kb: None,
        }
    }
}

/// Judging could not produce a verdict. Distinct from every graded status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgeFailure {
    #[error("submitted source is unreadable: {0}")]
    SourceUnreadable(String),
    #[error("judging failed: {0}")]
    Infrastructure(String),
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: JudgeRequest) -> Result<JudgeReport, JudgeFailure>;
}
