//! API 路由模块。
//!
//! 认证由外部网关负责，这里直接信任查询参数中的用户标识。

pub mod error;
pub mod state;
pub mod submission;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use goj_api_types::HealthResponse;
use tower_http::cors::CorsLayer;

pub use state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(submission::create_submission_router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(env!("CARGO_PKG_VERSION")))
}
