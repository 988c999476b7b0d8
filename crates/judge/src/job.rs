use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use goj_core::domain::{JudgeReport, ProblemLimits, SubmissionId, TestCase};
use tracing::{info, instrument, warn};

use crate::aggregator::{self, ResultAggregator};
use crate::controller::{Completion, ConcurrencyController};
use crate::error::Result;
use crate::events::{EventBroadcaster, JudgeEvent};
use crate::runner::{BuildOutcome, ProcessRunner, Workspace};
use crate::scratch::ScratchDir;
use crate::validator::{Admission, CodeValidator};

/// 一次提交的判题任务。
///
/// 并发控制器、结果集和临时目录都归该任务独占，不同提交之间互不影响。
pub struct JudgeJob {
    pub(crate) submission_id: SubmissionId,
    pub(crate) source: String,
    pub(crate) test_cases: Vec<TestCase>,
    pub(crate) limits: ProblemLimits,
    pub(crate) validator: Arc<dyn CodeValidator>,
    pub(crate) runner: Arc<dyn ProcessRunner>,
    pub(crate) events: EventBroadcaster,
    pub(crate) scratch_root: PathBuf,
    pub(crate) source_file: String,
    pub(crate) parallelism: usize,
    pub(crate) watchdog_factor: u32,
}

impl JudgeJob {
    /// 执行判题并返回最终结果。
    ///
    /// `Err` 表示判题本身失败（无法创建临时目录、无法启动进程、任务异常终止等），
    /// 此时不存在任何判题结果。
    #[instrument(
        skip(self),
        fields(
            submission_id = %self.submission_id,
            cases = self.test_cases.len(),
            validator = self.validator.name(),
            runner = self.runner.name(),
        )
    )]
    pub async fn run(self) -> Result<JudgeReport> {
        let report = self.judge().await?;
        self.events.emit(JudgeEvent::VerdictReached {
            submission_id: self.submission_id,
            status: report.status,
            message: report.message.clone(),
        });
        Ok(report)
    }

    async fn judge(&self) -> Result<JudgeReport> {
        if let Admission::Rejected { package } = self.validator.admit(&self.source) {
            warn!(package = %package, "submission rejected by import allow-list");
            return Ok(aggregator::invalid_code());
        }

        if self.test_cases.is_empty() {
            info!("no test cases, vacuous pass");
            return Ok(aggregator::no_cases());
        }

        // Removed on every exit path below, including unwinding.
        let scratch = ScratchDir::create(&self.scratch_root, &self.source_file, self.source.as_bytes())?;
        let workspace = Workspace::from_scratch(&scratch);

        match self.runner.build(&workspace).await? {
            BuildOutcome::Failed { stderr } => return Ok(aggregator::compile_error(stderr)),
            BuildOutcome::TimedOut => return Ok(aggregator::compile_timeout()),
            BuildOutcome::Built | BuildOutcome::Skipped => {}
        }

        let total = self.test_cases.len();
        let mut controller = ConcurrencyController::new(total.min(self.parallelism));
        let watchdog = watchdog_duration(
            &self.limits,
            self.watchdog_factor,
            total,
            controller.bound(),
        );

        self.events.emit(JudgeEvent::JobStarted {
            submission_id: self.submission_id,
            cases: total,
            parallelism: controller.bound(),
        });
        info!(
            parallelism = controller.bound(),
            watchdog_ms = watchdog.as_millis() as u64,
            "running test cases"
        );

        for (index, case) in self.test_cases.iter().enumerate() {
            let runner = self.runner.clone();
            let workspace = workspace.clone();
            let case = case.clone();
            let limits = self.limits;
            controller.spawn(index, async move { runner.run(&workspace, &case, &limits).await });
        }

        let mut results = ResultAggregator::new(total);
        let sleep = tokio::time::sleep(watchdog);
        tokio::pin!(sleep);

        let collected: Result<bool> = loop {
            tokio::select! {
                completion = controller.next_completion() => match completion {
                    None => break Ok(false),
                    Some(Err(err)) => break Err(err),
                    Some(Ok(Completion { result: Err(err), index })) => {
                        warn!(case = index, error = %err, "test case could not be judged");
                        break Err(err);
                    }
                    Some(Ok(Completion { result: Ok(report), index })) => {
                        self.events.emit(JudgeEvent::CaseFinished {
                            submission_id: self.submission_id,
                            index,
                            status: report.outcome.status(),
                        });
                        results.record(index, report);
                        if results.is_complete() {
                            break Ok(false);
                        }
                    }
                },
                _ = &mut sleep => {
                    warn!(
                        watchdog_ms = watchdog.as_millis() as u64,
                        passed = results.passed(),
                        "watchdog fired before every test case finished"
                    );
                    break Ok(true);
                }
            }
        };

        // Outstanding tasks are aborted, which kills their process groups.
        controller.shutdown().await;
        let watchdog_fired = collected?;

        let report = results.resolve(watchdog_fired);
        drop(scratch);
        Ok(report)
    }
}

/// `factor × max_runtime` per wave of test cases queued behind the concurrency bound.
pub fn watchdog_duration(
    limits: &ProblemLimits,
    factor: u32,
    cases: usize,
    bound: usize,
) -> Duration {
    let waves = cases.div_ceil(bound.max(1)).max(1);
    let waves = u32::try_from(waves).unwrap_or(u32::MAX);
    limits
        .runtime()
        .checked_mul(factor.max(1))
        .and_then(|per_wave| per_wave.checked_mul(waves))
        .unwrap_or(Duration::MAX)
}
