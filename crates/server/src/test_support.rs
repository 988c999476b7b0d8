use std::sync::Mutex;

use async_trait::async_trait;
use goj_core::domain::{Judge, JudgeFailure, JudgeReport, JudgeRequest, SourceCode};
use sea_orm::{ConnectOptions, DatabaseConnection};

use crate::db::connect_and_migrate;

/// Every pooled connection would open its own in-memory database, so the pool holds one.
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1);
    connect_and_migrate(options)
        .await
        .expect("in-memory database should migrate")
}

/// Judge that answers with a fixed result and remembers the last request.
pub struct StubJudge {
    answer: Result<JudgeReport, JudgeFailure>,
    seen: Mutex<Option<(String, usize)>>,
}

impl StubJudge {
    pub fn new(answer: Result<JudgeReport, JudgeFailure>) -> Self {
        Self {
            answer,
            seen: Mutex::new(None),
        }
    }

    /// Source text and number of test cases of the last request.
    pub fn last_request(&self) -> Option<(String, usize)> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Judge for StubJudge {
    async fn judge(&self, request: JudgeRequest) -> Result<JudgeReport, JudgeFailure> {
        let source = match &request.source {
            SourceCode::Path(path) => std::fs::read_to_string(path).expect("saved source should exist"),
            SourceCode::Inline(source) => source.clone(),
        };
        *self.seen.lock().expect("lock") = Some((source, request.test_cases.len()));
        self.answer.clone()
    }
}
