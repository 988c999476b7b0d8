//! 提交相关路由。

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use goj_api_types::{
    CaseResult, SubmissionListQuery, SubmissionPage, SubmissionSummary, SubmitQuery,
    SubmitResponse,
};
use goj_core::domain::{ProblemId, SubmissionStatus, UserId};

use super::error::ApiError;
use super::state::AppState;
use crate::repository::{SubmissionFilter, SubmissionRecord};
use crate::service::SubmitOutcome;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

pub fn create_submission_router() -> Router<Arc<AppState>> {
    Router::new()
        // 提交代码并同步返回判题结果，请求体为源码
        .route("/api/submit", post(submit))
        // 按题目、用户、状态筛选提交记录
        .route("/api/submissions", get(list_submissions))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubmitQuery>,
    source: String,
) -> Result<Json<SubmitResponse>, ApiError> {
    let problem_id = parse_id::<ProblemId>("problem_id", &query.problem_id)?;
    let user_id = parse_id::<UserId>("user_id", &query.user_id)?;
    if source.trim().is_empty() {
        return Err(ApiError::bad_request("source code must not be empty"));
    }

    let outcome = state.submissions.submit(user_id, problem_id, source).await?;
    Ok(Json(to_submit_response(outcome)))
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<SubmissionPage>, ApiError> {
    let filter = SubmissionFilter {
        problem_id: non_empty(&query.problem_id)
            .map(|raw| parse_id("problem_id", raw))
            .transpose()?,
        user_id: non_empty(&query.user_id)
            .map(|raw| parse_id("user_id", raw))
            .transpose()?,
        status: non_empty(&query.status)
            .map(|raw| {
                SubmissionStatus::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))
            })
            .transpose()?,
        page: query.page.unwrap_or(1).max(1),
        size: query.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    };
    let (page, size) = (filter.page, filter.size);

    let count = state.records.count(&filter).await?;
    let records = state.records.list(filter).await?;
    Ok(Json(SubmissionPage {
        items: records.into_iter().map(to_summary).collect(),
        count,
        page,
        size,
    }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|raw| !raw.is_empty())
}

fn parse_id<T>(field: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(raw).map_err(|e| ApiError::bad_request(format!("invalid {field} '{raw}': {e}")))
}

fn to_submit_response(outcome: SubmitOutcome) -> SubmitResponse {
    let SubmitOutcome { submission, report } = outcome;

    SubmitResponse {
        submission_id: submission.id.to_string(),
        status: report.status.as_str().to_string(),
        message: report.message,
        runtime_ms: report.runtime_ms,
        memory_kb: report.memory_kb,
        cases: report
            .cases
            .into_iter()
            .map(|case| CaseResult {
                index: case.index,
                status: case.status.as_str().to_string(),
                runtime_ms: case.runtime_ms,
                memory_kb: case.memory_kb,
            })
            .collect(),
    }
}

fn to_summary(record: SubmissionRecord) -> SubmissionSummary {
    SubmissionSummary {
        id: record.id.to_string(),
        problem_id: record.problem_id.to_string(),
        user_id: record.user_id.to_string(),
        status: record.status.as_str().to_string(),
        message: record.message,
        runtime_ms: record.runtime_ms,
        memory_kb: record.memory_kb,
        created_at: record.created_at.and_utc().to_rfc3339(),
    }
}
