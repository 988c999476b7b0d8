use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::{DomainError, ProblemId, SubmissionId, SubmissionStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    id: SubmissionId,
    problem_id: ProblemId,
    user_id: UserId,
    source_path: PathBuf,
    status: SubmissionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn pending(problem_id: ProblemId, user_id: UserId, source_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: SubmissionId::new(),
            problem_id,
            user_id,
            source_path: source_path.into(),
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the single `Pending -> terminal` transition a submission may take.
    pub fn settle(&mut self, status: SubmissionStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::AlreadyJudged(self.status));
        }
        if !status.is_terminal() {
            return Err(DomainError::NotTerminal(status));
        }

        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn problem_id(&self) -> ProblemId {
        self.problem_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn source_path(&self) -> &PathBuf {
        &self.source_path
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
