use crate::entity::{problem, test_case};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use goj_core::domain::{ProblemId, ProblemLimits, TestCase, TestCaseId};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ProblemRecord {
    pub id: ProblemId,
    pub title: String,
    pub content: String,
    pub limits: ProblemLimits,
    pub pass_num: i64,
    pub submit_num: i64,
}

#[derive(Debug, Clone)]
pub struct NewProblem {
    pub title: String,
    pub content: String,
    pub limits: ProblemLimits,
}

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    async fn create(&self, new_problem: NewProblem) -> Result<ProblemRecord>;
    async fn find_by_id(&self, problem_id: ProblemId) -> Result<Option<ProblemRecord>>;
    /// Appends a test case; cases are judged in insertion order.
    async fn add_test_case(&self, problem_id: ProblemId, case: TestCase) -> Result<TestCaseId>;
    async fn test_cases(&self, problem_id: ProblemId) -> Result<Vec<TestCase>>;
}

#[derive(Clone)]
pub struct SeaOrmProblemRepository {
    db: DatabaseConnection,
}

impl SeaOrmProblemRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn map_limits(model: &problem::Model) -> Result<ProblemLimits> {
        let max_runtime_ms = u64::try_from(model.max_runtime_ms).map_err(|_| {
            anyhow!(
                "invalid problem.max_runtime_ms from database: {}",
                model.max_runtime_ms
            )
        })?;
        let max_memory_kb = u64::try_from(model.max_memory_kb).map_err(|_| {
            anyhow!(
                "invalid problem.max_memory_kb from database: {}",
                model.max_memory_kb
            )
        })?;

        Ok(ProblemLimits::new(max_runtime_ms, max_memory_kb)?)
    }

    fn map_model(model: problem::Model) -> Result<ProblemRecord> {
        let id = ProblemId::from_str(&model.id)
            .map_err(|e| anyhow!("invalid problem.id '{}' from database: {e}", model.id))?;
        let limits = Self::map_limits(&model)?;

        Ok(ProblemRecord {
            id,
            title: model.title,
            content: model.content,
            limits,
            pass_num: model.pass_num,
            submit_num: model.submit_num,
        })
    }
}

#[async_trait]
impl ProblemRepository for SeaOrmProblemRepository {
    async fn create(&self, new_problem: NewProblem) -> Result<ProblemRecord> {
        let id = ProblemId::new();

        let active_model = problem::ActiveModel {
            id: Set(id.to_string()),
            title: Set(new_problem.title),
            content: Set(new_problem.content),
            max_runtime_ms: Set(i64::try_from(new_problem.limits.max_runtime_ms())?),
            max_memory_kb: Set(i64::try_from(new_problem.limits.max_memory_kb())?),
            pass_num: Set(0),
            submit_num: Set(0),
            ..Default::default()
        };

        let model = active_model.insert(&self.db).await?;
        Self::map_model(model)
    }

    async fn find_by_id(&self, problem_id: ProblemId) -> Result<Option<ProblemRecord>> {
        let model = problem::Entity::find_by_id(problem_id.to_string())
            .one(&self.db)
            .await?;

        model.map(Self::map_model).transpose()
    }

    async fn add_test_case(&self, problem_id: ProblemId, case: TestCase) -> Result<TestCaseId> {
        let id = TestCaseId::new();
        let position = test_case::Entity::find()
            .filter(test_case::Column::ProblemId.eq(problem_id.to_string()))
            .count(&self.db)
            .await?;

        let active_model = test_case::ActiveModel {
            id: Set(id.to_string()),
            problem_id: Set(problem_id.to_string()),
            position: Set(i32::try_from(position)?),
            input: Set(case.input),
            output: Set(case.expected_output),
            ..Default::default()
        };

        active_model.insert(&self.db).await?;
        Ok(id)
    }

    async fn test_cases(&self, problem_id: ProblemId) -> Result<Vec<TestCase>> {
        let models = test_case::Entity::find()
            .filter(test_case::Column::ProblemId.eq(problem_id.to_string()))
            .order_by_asc(test_case::Column::Position)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|model| TestCase::new(model.input, model.output))
            .collect())
    }
}
