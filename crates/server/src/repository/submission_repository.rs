use crate::entity::submission;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use goj_core::domain::{ProblemId, SubmissionId, SubmissionStatus, UserId};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub problem_id: ProblemId,
    pub user_id: UserId,
    pub path: String,
    pub status: SubmissionStatus,
    pub message: String,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    pub created_at: NaiveDateTime,
}

/// Listing filters. `None` matches everything; pages start at 1.
#[derive(Debug, Clone)]
pub struct SubmissionFilter {
    pub problem_id: Option<ProblemId>,
    pub user_id: Option<UserId>,
    pub status: Option<SubmissionStatus>,
    pub page: u64,
    pub size: u64,
}

impl Default for SubmissionFilter {
    fn default() -> Self {
        Self {
            problem_id: None,
            user_id: None,
            status: None,
            page: 1,
            size: 20,
        }
    }
}

/// Read side of submissions. Judged submissions are written by
/// [`crate::gateway::JudgementGateway`] together with the counters.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn find_by_id(&self, submission_id: SubmissionId) -> Result<Option<SubmissionRecord>>;
    /// Newest first.
    async fn list(&self, filter: SubmissionFilter) -> Result<Vec<SubmissionRecord>>;
    /// Matches across all pages; `page` and `size` are ignored.
    async fn count(&self, filter: &SubmissionFilter) -> Result<u64>;
}

#[derive(Clone)]
pub struct SeaOrmSubmissionRepository {
    db: DatabaseConnection,
}

impl SeaOrmSubmissionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn filtered(filter: &SubmissionFilter) -> Select<submission::Entity> {
        let mut query = submission::Entity::find();
        if let Some(problem_id) = filter.problem_id {
            query = query.filter(submission::Column::ProblemId.eq(problem_id.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(submission::Column::UserId.eq(user_id.to_string()));
        }
        if let Some(status) = filter.status {
            query = query.filter(submission::Column::Status.eq(map_status_code(status)));
        }
        query
    }
}

pub(crate) fn map_status(code: i16) -> Result<SubmissionStatus> {
    match code {
        -1 => Ok(SubmissionStatus::Pending),
        1 => Ok(SubmissionStatus::Accepted),
        2 => Ok(SubmissionStatus::WrongAnswer),
        3 => Ok(SubmissionStatus::TimeLimitExceeded),
        4 => Ok(SubmissionStatus::MemoryLimitExceeded),
        5 => Ok(SubmissionStatus::CompileError),
        6 => Ok(SubmissionStatus::InvalidCode),
        _ => Err(anyhow!("invalid submission.status code from database: {code}")),
    }
}

pub(crate) fn map_status_code(status: SubmissionStatus) -> i16 {
    match status {
        SubmissionStatus::Pending => -1,
        SubmissionStatus::Accepted => 1,
        SubmissionStatus::WrongAnswer => 2,
        SubmissionStatus::TimeLimitExceeded => 3,
        SubmissionStatus::MemoryLimitExceeded => 4,
        SubmissionStatus::CompileError => 5,
        SubmissionStatus::InvalidCode => 6,
    }
}

pub(crate) fn map_model(model: submission::Model) -> Result<SubmissionRecord> {
    let id = SubmissionId::from_str(&model.id)
        .map_err(|e| anyhow!("invalid submission.id '{}' from database: {e}", model.id))?;
    let user_id = UserId::from_str(&model.user_id).map_err(|e| {
        anyhow!(
            "invalid submission.user_id '{}' from database: {e}",
            model.user_id
        )
    })?;
    let problem_id = ProblemId::from_str(&model.problem_id).map_err(|e| {
        anyhow!(
            "invalid submission.problem_id '{}' from database: {e}",
            model.problem_id
        )
    })?;

    Ok(SubmissionRecord {
        id,
        problem_id,
        user_id,
        path: model.path,
        status: map_status(model.status)?,
        message: model.message,
        runtime_ms: model.runtime_ms.and_then(|ms| u64::try_from(ms).ok()),
        memory_kb: model.memory_kb.and_then(|kb| u64::try_from(kb).ok()),
        created_at: model.created_at,
    })
}

#[async_trait]
impl SubmissionRepository for SeaOrmSubmissionRepository {
    async fn find_by_id(&self, submission_id: SubmissionId) -> Result<Option<SubmissionRecord>> {
        let model = submission::Entity::find_by_id(submission_id.to_string())
            .one(&self.db)
            .await?;

        model.map(map_model).transpose()
    }

    async fn list(&self, filter: SubmissionFilter) -> Result<Vec<SubmissionRecord>> {
        let models = Self::filtered(&filter)
            .order_by_desc(submission::Column::CreatedAt)
            .paginate(&self.db, filter.size.max(1))
            .fetch_page(filter.page.saturating_sub(1))
            .await?;

        models.into_iter().map(map_model).collect()
    }

    async fn count(&self, filter: &SubmissionFilter) -> Result<u64> {
        Ok(Self::filtered(filter).count(&self.db).await?)
    }
}
