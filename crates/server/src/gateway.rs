//! 判题结果落库。
//!
//! 提交记录与题目、用户的计数器在同一个事务中更新，任何一步失败整体回滚，
//! 保证计数器与提交历史一致。

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use goj_core::domain::{JudgeReport, Submission};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, TransactionTrait,
};
use tracing::info;

use crate::entity::{problem, submission, user};
use crate::repository::SubmissionRecord;
use crate::repository::submission_repository::{map_model, map_status_code};

#[async_trait]
pub trait JudgementGateway: Send + Sync {
    /// 写入已判定的提交，并增加题目和用户的提交数；结果为通过时同时增加通过数。
    async fn record(&self, submission: &Submission, report: &JudgeReport) -> Result<SubmissionRecord>;
}

#[derive(Clone)]
pub struct SeaOrmJudgementGateway {
    db: DatabaseConnection,
}

impl SeaOrmJudgementGateway {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JudgementGateway for SeaOrmJudgementGateway {
    async fn record(&self, submission: &Submission, report: &JudgeReport) -> Result<SubmissionRecord> {
        if !submission.status().is_terminal() {
            bail!("submission {} has not been judged yet", submission.id());
        }
        let passed = i64::from(submission.status().is_accepted());

        // Dropping the transaction without commit rolls it back.
        let txn = self.db.begin().await?;

        let active_model = submission::ActiveModel {
            id: Set(submission.id().to_string()),
            problem_id: Set(submission.problem_id().to_string()),
            user_id: Set(submission.user_id().to_string()),
            path: Set(submission.source_path().to_string_lossy().into_owned()),
            status: Set(map_status_code(submission.status())),
            message: Set(report.message.clone()),
            runtime_ms: Set(report.runtime_ms.and_then(|ms| i64::try_from(ms).ok())),
            memory_kb: Set(report.memory_kb.and_then(|kb| i64::try_from(kb).ok())),
            created_at: Set(submission.created_at().naive_utc()),
            updated_at: Set(submission.updated_at().naive_utc()),
        };
        let model = active_model.insert(&txn).await?;

        let updated = problem::Entity::update_many()
            .col_expr(
                problem::Column::SubmitNum,
                Expr::col(problem::Column::SubmitNum).add(1),
            )
            .col_expr(
                problem::Column::PassNum,
                Expr::col(problem::Column::PassNum).add(passed),
            )
            .filter(problem::Column::Id.eq(submission.problem_id().to_string()))
            .exec(&txn)
            .await?;
        if updated.rows_affected != 1 {
            return Err(anyhow!("problem {} does not exist", submission.problem_id()));
        }

        let updated = user::Entity::update_many()
            .col_expr(
                user::Column::SubmitNum,
                Expr::col(user::Column::SubmitNum).add(1),
            )
            .col_expr(
                user::Column::PassNum,
                Expr::col(user::Column::PassNum).add(passed),
            )
            .filter(user::Column::Id.eq(submission.user_id().to_string()))
            .exec(&txn)
            .await?;
        if updated.rows_affected != 1 {
            return Err(anyhow!("user {} does not exist", submission.user_id()));
        }

        txn.commit().await?;

        info!(
            submission_id = %submission.id(),
            status = %submission.status(),
            "judged submission recorded"
        );
        map_model(model)
    }
}
