use std::sync::Arc;

use async_trait::async_trait;
use goj_core::domain::{
    Judge, JudgeFailure, JudgeReport, JudgeRequest, ProblemLimits, SourceCode, SubmissionId,
    TestCase,
};
use tracing::info;

use crate::config::JudgeConfig;
use crate::error::Result;
use crate::events::{EventBroadcaster, EventStream};
use crate::job::JudgeJob;
use crate::runner::{LocalProcessRunner, ProcessRunner};
use crate::sampler::build_sampler;
use crate::validator::{AllowList, CodeValidator, build_validator, read_source};

/// 判题引擎：持有配置和可共享的组件，为每次提交创建独立的 [`JudgeJob`]。
pub struct JudgeEngine {
    config: JudgeConfig,
    validator: Arc<dyn CodeValidator>,
    runner: Arc<dyn ProcessRunner>,
    events: EventBroadcaster,
}

impl JudgeEngine {
    pub fn new(config: JudgeConfig) -> Result<Self> {
        config.validate()?;

        let validator = build_validator(
            config.validator,
            AllowList::new(config.allowed_imports.iter().cloned()),
        );
        let sampler = build_sampler(config.sampler, &config.toolchain.unmetered_processes);
        let runner: Arc<dyn ProcessRunner> = Arc::new(LocalProcessRunner::new(
            config.toolchain.clone(),
            sampler.clone(),
            config.sample_interval(),
        ));

        info!(
            validator = validator.name(),
            sampler = sampler.name(),
            runner = runner.name(),
            parallelism = config.parallelism(),
            "judge engine initialized"
        );

        Ok(Self {
            config,
            validator,
            runner,
            events: EventBroadcaster::default(),
        })
    }

    /// 替换执行后端（例如带沙箱的实现）。
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn job(
        &self,
        submission_id: SubmissionId,
        source: String,
        test_cases: Vec<TestCase>,
        limits: ProblemLimits,
    ) -> JudgeJob {
        JudgeJob {
            submission_id,
            source,
            test_cases,
            limits,
            validator: self.validator.clone(),
            runner: self.runner.clone(),
            events: self.events.clone(),
            scratch_root: self.config.scratch_root.clone(),
            source_file: self.config.toolchain.source_file.clone(),
            parallelism: self.config.parallelism(),
            watchdog_factor: self.config.watchdog_factor,
        }
    }
}

#[async_trait]
impl Judge for JudgeEngine {
    async fn judge(&self, request: JudgeRequest) -> std::result::Result<JudgeReport, JudgeFailure> {
        let source = match request.source {
            SourceCode::Path(path) => read_source(&path).await?,
            SourceCode::Inline(source) => source,
        };

        self.job(request.submission_id, source, request.test_cases, request.limits)
            .run()
            .await
            .map_err(JudgeFailure::from)
    }
}
