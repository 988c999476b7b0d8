//! 单个测试用例的进程执行。
//!
//! `ProcessRunner` 是执行后端的抽象：基线实现 [`LocalProcessRunner`] 只限制墙钟时间，
//! 被测程序拥有与判题进程相同的文件系统和网络权限。需要隔离时替换为带沙箱的后端即可，
//! 上层判题逻辑不受影响。

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use goj_core::domain::{ProblemLimits, SubmissionStatus, TestCase};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ToolchainConfig;
use crate::error::{JudgeError, Result};
use crate::sampler::ResourceSampler;
use crate::scratch::ScratchDir;

/// Captured bytes per stream. Output past the limit is still read and discarded, so
/// a flooding program ends on its own exit status; one extra byte is kept so that an
/// over-long stdout never equals the expected output.
const OUTPUT_LIMIT_BYTES: u64 = 64 << 20;
/// Diagnostics carried into verdict messages are cut to this length.
const DIAGNOSTIC_LIMIT_BYTES: usize = 8 << 10;
const BINARY_NAME: &str = "main";

/// 单个测试用例的执行结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Accepted,
    WrongAnswer,
    Timeout,
    MemoryExceeded { used_kb: u64 },
    CompileFailure { stderr: String },
    RuntimeFailure { exit_code: Option<i32>, stderr: String },
}

impl ExecutionOutcome {
    /// 运行时错误按答案错误计。
    pub fn status(&self) -> SubmissionStatus {
        match self {
            ExecutionOutcome::Accepted => SubmissionStatus::Accepted,
            ExecutionOutcome::WrongAnswer | ExecutionOutcome::RuntimeFailure { .. } => {
                SubmissionStatus::WrongAnswer
            }
            ExecutionOutcome::Timeout => SubmissionStatus::TimeLimitExceeded,
            ExecutionOutcome::MemoryExceeded { .. } => SubmissionStatus::MemoryLimitExceeded,
            ExecutionOutcome::CompileFailure { .. } => SubmissionStatus::CompileError,
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::CompileFailure { stderr }
            | ExecutionOutcome::RuntimeFailure { stderr, .. }
                if !stderr.is_empty() =>
            {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: ExecutionOutcome,
    pub elapsed: Duration,
    pub memory_kb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// 工具链没有独立的构建步骤。
    Skipped,
    Built,
    Failed { stderr: String },
    TimedOut,
}

/// 执行所需的路径，均为绝对路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub binary: PathBuf,
}

impl Workspace {
    pub fn from_scratch(scratch: &ScratchDir) -> Self {
        Self {
            dir: scratch.path().to_path_buf(),
            source: scratch.source().to_path_buf(),
            binary: scratch.artifact(BINARY_NAME),
        }
    }

    fn render(&self, arg: &str) -> String {
        arg.replace("{source}", &path_str(&self.source))
            .replace("{binary}", &path_str(&self.binary))
            .replace("{dir}", &path_str(&self.dir))
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// 执行后端。
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    fn name(&self) -> &str;

    /// 在运行任何测试用例之前执行一次。
    async fn build(&self, workspace: &Workspace) -> Result<BuildOutcome>;

    /// 运行一个测试用例。`Err` 只表示系统错误（如无法启动进程），不是判题结果。
    async fn run(
        &self,
        workspace: &Workspace,
        case: &TestCase,
        limits: &ProblemLimits,
    ) -> Result<RunReport>;
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Deadline,
    Code(i32),
    Signal(i32),
}

impl From<ExitStatus> for Exit {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Exit::Code(code),
            (None, Some(signal)) => Exit::Signal(signal),
            (None, None) => Exit::Code(-1),
        }
    }
}

struct Finished {
    exit: Exit,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    elapsed: Duration,
    peak_kb: Option<u64>,
}

/// 在本机直接派生子进程的执行后端。
pub struct LocalProcessRunner {
    toolchain: ToolchainConfig,
    sampler: Arc<dyn ResourceSampler>,
    sample_interval: Duration,
}

impl LocalProcessRunner {
    pub fn new(
        toolchain: ToolchainConfig,
        sampler: Arc<dyn ResourceSampler>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            toolchain,
            sampler,
            sample_interval,
        }
    }

    /// Spawns `argv` in its own process group and supervises it until exit or `deadline`.
    ///
    /// stdin is written from a separate task that always drops (closes) the pipe, while
    /// stdout and stderr are drained concurrently, so neither side can block the other.
    async fn execute(
        &self,
        argv: &[String],
        workspace: &Workspace,
        input: Option<String>,
        deadline: Duration,
    ) -> Result<Finished> {
        let mut rendered = argv.iter().map(|arg| workspace.render(arg));
        let program = rendered
            .next()
            .ok_or_else(|| JudgeError::Config("empty command line".to_string()))?;
        let args: Vec<String> = rendered.collect();

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(&workspace.dir)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);
        for var in &self.toolchain.env {
            cmd.env(&var.key, &var.value);
        }

        debug!(program = %program, args = ?args, "spawning candidate process");
        let mut child = cmd.spawn().map_err(|source| JudgeError::Spawn {
            program: program.clone(),
            source,
        })?;
        let started = Instant::now();
        let pgid = child.id();
        let mut group = GroupGuard::new(pgid);

        let writer = match (child.stdin.take(), input) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                let written = stdin.write_all(input.as_bytes()).await;
                drop(stdin);
                written
            })),
            _ => None,
        };
        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let peak = Arc::new(Peak::default());
        let sampling = pgid.map(|pgid| {
            tokio::spawn(sample_group(
                self.sampler.clone(),
                pgid,
                self.sample_interval,
                peak.clone(),
            ))
        });

        let status = tokio::select! {
            biased;
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(deadline) => None,
        };
        if let Some(sampling) = sampling {
            sampling.abort();
        }
        let peak_kb = peak.get();
        let status = status.transpose()?;
        let elapsed = started.elapsed();

        // Leftover group members would otherwise keep the output pipes open.
        group.kill();

        let Some(status) = status else {
            if let Err(err) = child.kill().await {
                warn!(error = %err, "failed to kill timed out process");
            }
            if let Some(writer) = writer {
                writer.abort();
            }
            stdout.abort();
            stderr.abort();
            return Ok(Finished {
                exit: Exit::Deadline,
                stdout: Vec::new(),
                stderr: Vec::new(),
                elapsed,
                peak_kb,
            });
        };

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The program may legitimately exit without consuming its input.
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("candidate closed stdin before reading all input");
                }
                Ok(Err(err)) => warn!(error = %err, "failed to write candidate stdin"),
                Err(err) => warn!(error = %err, "stdin writer task failed"),
            }
        }

        Ok(Finished {
            exit: Exit::from(status),
            stdout: join_output(stdout).await?,
            stderr: join_output(stderr).await?,
            elapsed,
            peak_kb,
        })
    }
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    fn name(&self) -> &str {
        "local"
    }

    async fn build(&self, workspace: &Workspace) -> Result<BuildOutcome> {
        let Some(argv) = &self.toolchain.build else {
            return Ok(BuildOutcome::Skipped);
        };

        let finished = self
            .execute(argv, workspace, None, self.toolchain.build_timeout())
            .await?;
        let outcome = match finished.exit {
            Exit::Deadline => BuildOutcome::TimedOut,
            Exit::Code(0) => BuildOutcome::Built,
            Exit::Code(_) | Exit::Signal(_) => BuildOutcome::Failed {
                stderr: diagnostic(&finished.stderr),
            },
        };

        info!(
            elapsed_ms = finished.elapsed.as_millis() as u64,
            outcome = ?outcome,
            "build finished"
        );
        Ok(outcome)
    }

    async fn run(
        &self,
        workspace: &Workspace,
        case: &TestCase,
        limits: &ProblemLimits,
    ) -> Result<RunReport> {
        let baseline = self.sampler.begin();
        let finished = self
            .execute(
                &self.toolchain.run,
                workspace,
                Some(terminated_input(&case.input)),
                limits.runtime(),
            )
            .await?;
        let memory_kb = self.sampler.finish(baseline, finished.peak_kb);

        let outcome = classify(
            finished.exit,
            &finished.stdout,
            &finished.stderr,
            &case.expected_output,
            memory_kb,
            limits,
            self.toolchain.build_failure_exit_code,
        );

        Ok(RunReport {
            outcome,
            elapsed: finished.elapsed,
            memory_kb,
        })
    }
}

/// Test input always reaches the program newline-terminated.
fn terminated_input(input: &str) -> String {
    if input.ends_with('\n') {
        input.to_string()
    } else {
        format!("{input}\n")
    }
}

/// Highest sample seen so far; `u64::MAX` marks "nothing sampled".
struct Peak(AtomicU64);

impl Default for Peak {
    fn default() -> Self {
        Self(AtomicU64::new(u64::MAX))
    }
}

impl Peak {
    fn record(&self, kb: u64) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current == u64::MAX || kb > current).then_some(kb)
            });
    }

    fn get(&self) -> Option<u64> {
        let kb = self.0.load(Ordering::Relaxed);
        (kb != u64::MAX).then_some(kb)
    }
}

/// Samples the process group on every tick until aborted. The procfs scan runs on the
/// blocking pool so it never holds up the runtime that enforces the deadline.
async fn sample_group(
    sampler: Arc<dyn ResourceSampler>,
    pgid: u32,
    interval: Duration,
    peak: Arc<Peak>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let sampler = sampler.clone();
        match tokio::task::spawn_blocking(move || sampler.observe(pgid)).await {
            Ok(Some(kb)) => peak.record(kb),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "memory sampling task failed");
                return;
            }
        }
    }
}

/// Kills the candidate's whole process group once, at the latest when dropped.
///
/// `kill_on_drop` only reaches the direct child; a cancelled run must not leave
/// grandchildren (such as the binary started by `go run`) behind.
struct GroupGuard {
    pgid: Option<i32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self {
            pgid: pgid.and_then(|pgid| i32::try_from(pgid).ok()),
        }
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
            Err(err) => warn!(pgid, error = %err, "failed to kill process group"),
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn drain<R>(reader: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => drain_limited(reader, OUTPUT_LIMIT_BYTES).await,
        None => Ok(Vec::new()),
    }
}

/// Keeps the first `limit + 1` bytes and reads the rest into the void until EOF.
async fn drain_limited<R>(reader: R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut captured = reader.take(limit.saturating_add(1));
    captured.read_to_end(&mut buf).await?;

    let mut rest = captured.into_inner();
    let discarded = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    if discarded > 0 {
        debug!(discarded, "output beyond the capture limit discarded");
    }
    Ok(buf)
}

async fn join_output(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .await
        .map_err(|e| JudgeError::TaskAborted(format!("output reader: {e}")))?
        .map_err(JudgeError::from)
}

fn diagnostic(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    if text.len() <= DIAGNOSTIC_LIMIT_BYTES {
        return text.into_owned();
    }
    let mut cut = DIAGNOSTIC_LIMIT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}

/// Classification order: deadline, build-failure exit code, other failure exits,
/// output comparison, then memory. A memory limit of 0 means unlimited.
fn classify(
    exit: Exit,
    stdout: &[u8],
    stderr: &[u8],
    expected: &str,
    memory_kb: u64,
    limits: &ProblemLimits,
    build_failure_exit_code: Option<i32>,
) -> ExecutionOutcome {
    let outcome = match exit {
        Exit::Deadline => ExecutionOutcome::Timeout,
        Exit::Code(code) if Some(code) == build_failure_exit_code && code != 0 => {
            ExecutionOutcome::CompileFailure {
                stderr: diagnostic(stderr),
            }
        }
        Exit::Code(code) if code != 0 => ExecutionOutcome::RuntimeFailure {
            exit_code: Some(code),
            stderr: diagnostic(stderr),
        },
        Exit::Signal(signal) => ExecutionOutcome::RuntimeFailure {
            exit_code: None,
            stderr: format!("killed by signal {signal}\n{}", diagnostic(stderr)),
        },
        Exit::Code(_) if stdout != expected.as_bytes() => ExecutionOutcome::WrongAnswer,
        Exit::Code(_) if limits.max_memory_kb() > 0 && memory_kb > limits.max_memory_kb() => {
            ExecutionOutcome::MemoryExceeded { used_kb: memory_kb }
        }
        Exit::Code(_) => ExecutionOutcome::Accepted,
    };

    match &outcome {
        ExecutionOutcome::Accepted => debug!(memory_kb, "test case passed"),
        ExecutionOutcome::WrongAnswer => info!(
            expected_len = expected.len(),
            actual_len = stdout.len(),
            "output mismatch"
        ),
        other => info!(outcome = ?other, memory_kb, "test case failed"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ProblemLimits {
        ProblemLimits::new(1000, 1024).expect("limits should be valid")
    }

    #[test]
    fn deadline_wins_over_everything() {
        let outcome = classify(Exit::Deadline, b"34\n", b"", "34\n", 0, &limits(), Some(2));

        assert_eq!(outcome, ExecutionOutcome::Timeout);
    }

    #[test]
    fn build_failure_code_is_a_compile_failure() {
        let outcome = classify(
            Exit::Code(2),
            b"",
            b"./main.go:3:1: syntax error",
            "34\n",
            0,
            &limits(),
            Some(2),
        );

        assert_eq!(
            outcome,
            ExecutionOutcome::CompileFailure {
                stderr: "./main.go:3:1: syntax error".to_string()
            }
        );
        assert_eq!(outcome.status(), SubmissionStatus::CompileError);
    }

    #[test]
    fn other_nonzero_exit_counts_as_wrong_answer() {
        let outcome = classify(Exit::Code(1), b"", b"panic", "34\n", 0, &limits(), Some(2));

        assert_eq!(
            outcome,
            ExecutionOutcome::RuntimeFailure {
                exit_code: Some(1),
                stderr: "panic".to_string()
            }
        );
        assert_eq!(outcome.status(), SubmissionStatus::WrongAnswer);
    }

    #[test]
    fn signal_is_a_runtime_failure() {
        let outcome = classify(Exit::Signal(11), b"", b"", "34\n", 0, &limits(), None);

        assert!(matches!(
            outcome,
            ExecutionOutcome::RuntimeFailure {
                exit_code: None,
                ..
            }
        ));
    }

    #[test]
    fn output_is_compared_exactly() {
        assert_eq!(
            classify(Exit::Code(0), b"35\n", b"", "34\n", 0, &limits(), None),
            ExecutionOutcome::WrongAnswer
        );
        assert_eq!(
            classify(Exit::Code(0), b"34", b"", "34\n", 0, &limits(), None),
            ExecutionOutcome::WrongAnswer
        );
        assert_eq!(
            classify(Exit::Code(0), b"34\n", b"", "34\n", 512, &limits(), None),
            ExecutionOutcome::Accepted
        );
    }

    #[test]
    fn memory_is_checked_after_output() {
        assert_eq!(
            classify(Exit::Code(0), b"34\n", b"", "34\n", 4096, &limits(), None),
            ExecutionOutcome::MemoryExceeded { used_kb: 4096 }
        );
        assert_eq!(
            classify(Exit::Code(0), b"0\n", b"", "34\n", 4096, &limits(), None),
            ExecutionOutcome::WrongAnswer
        );
    }

    #[test]
    fn zero_memory_limit_is_unlimited() {
        let unlimited = ProblemLimits::new(1000, 0).expect("limits should be valid");

        assert_eq!(
            classify(Exit::Code(0), b"1\n", b"", "1\n", 1 << 20, &unlimited, None),
            ExecutionOutcome::Accepted
        );
    }

    #[test]
    fn input_gets_a_trailing_newline_once() {
        assert_eq!(terminated_input("23 11"), "23 11\n");
        assert_eq!(terminated_input("23 11\n"), "23 11\n");
    }

    #[test]
    fn placeholders_are_rendered_with_absolute_paths() {
        let workspace = Workspace {
            dir: PathBuf::from("/srv/code/abc"),
            source: PathBuf::from("/srv/code/abc/main.go"),
            binary: PathBuf::from("/srv/code/abc/main"),
        };

        assert_eq!(workspace.render("{source}"), "/srv/code/abc/main.go");
        assert_eq!(workspace.render("-o={binary}"), "-o=/srv/code/abc/main");
        assert_eq!(workspace.render("{dir}"), "/srv/code/abc");
    }

    #[tokio::test]
    async fn flooding_writer_is_drained_to_the_end() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let flood = tokio::spawn(async move {
            writer.write_all(&[b'y'; 16 << 10]).await?;
            writer.shutdown().await
        });

        let captured = drain_limited(reader, 100).await.expect("drain should finish");

        assert_eq!(captured.len(), 101);
        flood
            .await
            .expect("writer task")
            .expect("writer must not block on a full pipe");
    }

    #[test]
    fn peak_keeps_the_highest_sample() {
        let peak = Peak::default();
        assert_eq!(peak.get(), None);

        peak.record(300);
        peak.record(120);
        peak.record(0);
        assert_eq!(peak.get(), Some(300));
    }

    #[test]
    fn long_diagnostics_are_truncated_on_char_boundary() {
        let long = "错".repeat(DIAGNOSTIC_LIMIT_BYTES);
        let cut = diagnostic(long.as_bytes());

        assert!(cut.len() <= DIAGNOSTIC_LIMIT_BYTES + '…'.len_utf8());
        assert!(cut.ends_with('…'));
    }
}
