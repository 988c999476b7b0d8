//! Shared request/response types used by API-facing crates.
//!
//! Statuses travel as their snake_case names (`accepted`, `wrong_answer`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn ok(version: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Query of `POST /api/submit`; the request body is the source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitQuery {
    pub problem_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub index: usize,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub submission_id: String,
    pub status: String,
    pub message: String,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    #[serde(default)]
    pub cases: Vec<CaseResult>,
}

/// Filters of `GET /api/submissions`. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionListQuery {
    pub problem_id: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub id: String,
    pub problem_id: String,
    pub user_id: String,
    pub status: String,
    pub message: String,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPage {
    pub items: Vec<SubmissionSummary>,
    /// Matching submissions across all pages.
    pub count: u64,
    pub page: u64,
    pub size: u64,
}
