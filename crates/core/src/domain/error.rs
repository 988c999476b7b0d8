use thiserror::Error;

use super::SubmissionStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid limits: max runtime must be positive, got {max_runtime_ms}ms")]
    InvalidLimits { max_runtime_ms: u64 },
    #[error("submission already judged as {0:?}")]
    AlreadyJudged(SubmissionStatus),
    #[error("{0:?} is not a terminal status")]
    NotTerminal(SubmissionStatus),
    #[error("unknown submission status: {0}")]
    UnknownStatus(String),
}
