use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use goj_api_types::ErrorResponse;
use goj_core::domain::JudgeFailure;
use tracing::error;

use crate::service::SubmitError;

/// API 错误类型。
#[derive(Debug)]
pub struct ApiError {
    message: String,
    code: &'static str,
    status: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: "BAD_REQUEST",
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ProblemNotFound(_) => ApiError {
                message: err.to_string(),
                code: "PROBLEM_NOT_FOUND",
                status: StatusCode::NOT_FOUND,
            },
            SubmitError::UserNotFound(_) => ApiError {
                message: err.to_string(),
                code: "USER_NOT_FOUND",
                status: StatusCode::NOT_FOUND,
            },
            SubmitError::Judge(JudgeFailure::SourceUnreadable(message)) => ApiError {
                message,
                code: "SOURCE_UNREADABLE",
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
            SubmitError::Judge(JudgeFailure::Infrastructure(message)) => ApiError {
                message,
                code: "JUDGE_FAILED",
                status: StatusCode::SERVICE_UNAVAILABLE,
            },
            SubmitError::Internal(err) => err.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "internal error");
        ApiError {
            message: err.to_string(),
            code: "INTERNAL_ERROR",
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}
