#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use goj_core::domain::{JudgeRequest, ProblemLimits, SourceCode, SubmissionId, TestCase};
use goj_judge::{
    BuildOutcome, ExecutionOutcome, JudgeConfig, JudgeError, ProcessRunner, Result, RunReport,
    ToolchainConfig, Workspace,
};

/// Case input that makes [`MockRunner`] panic.
pub const PANIC: &str = "panic";
/// Case input that makes [`MockRunner`] never finish.
pub const HANG: &str = "hang";
/// Case input that makes [`MockRunner`] fail like a missing executable.
pub const SPAWN_ERROR: &str = "spawn-error";

/// Runner that never starts a process: a case passes when its input equals its
/// expected output. Tracks how many runs overlap.
#[derive(Clone)]
pub struct MockRunner {
    delay: Duration,
    build: BuildOutcome,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

impl MockRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            build: BuildOutcome::Skipped,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_build(mut self, build: BuildOutcome) -> Self {
        self.build = build;
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn build(&self, _workspace: &Workspace) -> Result<BuildOutcome> {
        Ok(self.build.clone())
    }

    async fn run(
        &self,
        workspace: &Workspace,
        case: &TestCase,
        _limits: &ProblemLimits,
    ) -> Result<RunReport> {
        assert!(workspace.source.exists(), "scratch source must exist while running");

        self.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(self.active.clone());

        tokio::time::sleep(self.delay).await;

        let outcome = match case.input.as_str() {
            PANIC => panic!("mock runner blew up"),
            HANG => std::future::pending().await,
            SPAWN_ERROR => {
                return Err(JudgeError::Spawn {
                    program: "mock".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
                });
            }
            input if input == case.expected_output => ExecutionOutcome::Accepted,
            _ => ExecutionOutcome::WrongAnswer,
        };

        Ok(RunReport {
            outcome,
            elapsed: self.delay,
            memory_kb: 1024,
        })
    }
}

/// Engine config that runs submissions as POSIX shell scripts.
pub fn sh_config(scratch_root: &Path) -> JudgeConfig {
    JudgeConfig {
        scratch_root: scratch_root.to_path_buf(),
        toolchain: ToolchainConfig {
            source_file: "main.sh".to_string(),
            build: None,
            build_timeout_ms: 10_000,
            run: vec!["sh".to_string(), "{source}".to_string()],
            build_failure_exit_code: None,
            env: Vec::new(),
            unmetered_processes: Vec::new(),
        },
        ..JudgeConfig::default()
    }
}

pub fn limits(max_runtime_ms: u64, max_memory_kb: u64) -> ProblemLimits {
    ProblemLimits::new(max_runtime_ms, max_memory_kb).expect("limits should be valid")
}

pub fn case(input: &str, expected_output: &str) -> TestCase {
    TestCase::new(input, expected_output)
}

pub fn request(source: &str, test_cases: Vec<TestCase>, limits: ProblemLimits) -> JudgeRequest {
    JudgeRequest {
        submission_id: SubmissionId::new(),
        source: SourceCode::Inline(source.to_string()),
        test_cases,
        limits,
    }
}

/// Number of entries left under the scratch root.
pub fn leftovers(scratch_root: &Path) -> usize {
    std::fs::read_dir(scratch_root)
        .map(|entries| entries.count())
        .unwrap_or(0)
}
