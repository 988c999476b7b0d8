//! 统一的应用状态。

use std::sync::Arc;

use crate::repository::SubmissionRepository;
use crate::service::SubmissionService;

/// 统一的应用状态，包含所有路由共享的服务。
#[derive(Clone)]
pub struct AppState {
    /// 提交与判题流程。
    pub submissions: Arc<SubmissionService>,
    /// 提交记录查询。
    pub records: Arc<dyn SubmissionRepository>,
}

impl AppState {
    pub fn new(submissions: Arc<SubmissionService>, records: Arc<dyn SubmissionRepository>) -> Self {
        Self {
            submissions,
            records,
        }
    }
}
