use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use goj_core::domain::{
    Judge, JudgeFailure, JudgeReport, JudgeRequest, ProblemId, SourceCode, Submission, UserId,
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::gateway::JudgementGateway;
use crate::repository::{ProblemRepository, SubmissionRecord, UserRepository};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("题目不存在: {0}")]
    ProblemNotFound(ProblemId),

    #[error("用户不存在: {0}")]
    UserNotFound(UserId),

    #[error(transparent)]
    Judge(#[from] JudgeFailure),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub submission: SubmissionRecord,
    pub report: JudgeReport,
}

/// 提交流程：保存源码、判题、在一个事务中记录结果。
pub struct SubmissionService {
    judge: Arc<dyn Judge>,
    problems: Arc<dyn ProblemRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn JudgementGateway>,
    upload_dir: PathBuf,
    source_file: String,
}

impl SubmissionService {
    pub fn new(
        judge: Arc<dyn Judge>,
        problems: Arc<dyn ProblemRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn JudgementGateway>,
        upload_dir: PathBuf,
        source_file: String,
    ) -> Self {
        Self {
            judge,
            problems,
            users,
            gateway,
            upload_dir,
            source_file,
        }
    }

    /// 判题失败（[`SubmitError::Judge`]）时不写入任何记录；判题或记录失败时保存的源码都会被删除。
    #[instrument(skip_all, fields(%user_id, %problem_id, source_len = source.len()))]
    pub async fn submit(
        &self,
        user_id: UserId,
        problem_id: ProblemId,
        source: String,
    ) -> Result<SubmitOutcome, SubmitError> {
        let problem = self
            .problems
            .find_by_id(problem_id)
            .await?
            .ok_or(SubmitError::ProblemNotFound(problem_id))?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(SubmitError::UserNotFound(user_id))?;
        let test_cases = self.problems.test_cases(problem_id).await?;

        let path = self.save_source(&source).await?;
        let mut submission = Submission::pending(problem_id, user_id, &path);

        let request = JudgeRequest {
            submission_id: submission.id(),
            source: SourceCode::Path(path.clone()),
            test_cases,
            limits: problem.limits,
        };
        let report = match self.judge.judge(request).await {
            Ok(report) => report,
            Err(failure) => {
                error!(submission_id = %submission.id(), error = %failure, "judging failed, nothing recorded");
                self.discard_source(&path).await;
                return Err(failure.into());
            }
        };

        let record = match self.settle_and_record(&mut submission, &report).await {
            Ok(record) => record,
            Err(err) => {
                error!(submission_id = %submission.id(), error = %err, "failed to record verdict");
                self.discard_source(&path).await;
                return Err(err.into());
            }
        };

        info!(
            submission_id = %record.id,
            status = %record.status,
            runtime_ms = ?report.runtime_ms,
            memory_kb = ?report.memory_kb,
            "submission judged"
        );
        Ok(SubmitOutcome {
            submission: record,
            report,
        })
    }

    async fn settle_and_record(
        &self,
        submission: &mut Submission,
        report: &JudgeReport,
    ) -> anyhow::Result<SubmissionRecord> {
        submission
            .settle(report.status)
            .context("judge returned a non-terminal status")?;
        self.gateway.record(submission, report).await
    }

    async fn save_source(&self, source: &str) -> anyhow::Result<PathBuf> {
        let dir = self.upload_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(&self.source_file);
        tokio::fs::write(&path, source)
            .await
            .with_context(|| format!("failed to save source to {}", path.display()))?;
        Ok(path)
    }

    async fn discard_source(&self, path: &Path) {
        let Some(dir) = path.parent() else {
            return;
        };
        if let Err(err) = tokio::fs::remove_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %err, "failed to remove saved source");
        }
    }
}
