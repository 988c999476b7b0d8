use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{JudgeError, Result};

/// 判题引擎配置。
///
/// 所有字段均有默认值，空配置即可使用（Go 工具链，先编译后运行）。
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    /// 每次提交的临时目录都创建在该目录下。
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    /// 单次提交内并行运行的测试用例上限，0 表示使用主机并行度。
    #[serde(default)]
    pub max_parallelism: usize,
    /// 看门狗时长相对于单个用例时限的倍数。
    #[serde(default = "default_watchdog_factor")]
    pub watchdog_factor: u32,
    #[serde(default)]
    pub validator: ValidatorKind,
    #[serde(default)]
    pub sampler: SamplerKind,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// 允许导入的包。
    #[serde(default = "default_allowed_imports")]
    pub allowed_imports: Vec<String>,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

impl JudgeConfig {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.toolchain.run.is_empty() {
            return Err(JudgeError::Config("toolchain.run must not be empty".to_string()));
        }
        if matches!(&self.toolchain.build, Some(build) if build.is_empty()) {
            return Err(JudgeError::Config(
                "toolchain.build must not be empty when present".to_string(),
            ));
        }
        if self.watchdog_factor == 0 {
            return Err(JudgeError::Config("watchdog_factor must be positive".to_string()));
        }
        if self.sample_interval_ms == 0 {
            return Err(JudgeError::Config("sample_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// 实际生效的并行上限，至少为 1。
    pub fn parallelism(&self) -> usize {
        if self.max_parallelism > 0 {
            return self.max_parallelism;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            max_parallelism: 0,
            watchdog_factor: default_watchdog_factor(),
            validator: ValidatorKind::default(),
            sampler: SamplerKind::default(),
            sample_interval_ms: default_sample_interval_ms(),
            allowed_imports: default_allowed_imports(),
            toolchain: ToolchainConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Lexical,
    #[default]
    Syntax,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    Supervisor,
    #[default]
    ProcessGroup,
}

/// 提交程序的构建与运行命令。
///
/// argv 中可以使用 `{source}`、`{binary}`、`{dir}` 占位符。
/// 省略整个 `[toolchain]` 段时使用 [`ToolchainConfig::go_build`]。
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    #[serde(default = "default_source_file")]
    pub source_file: String,
    #[serde(default)]
    pub build: Option<Vec<String>>,
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,
    pub run: Vec<String>,
    /// 运行命令以该退出码结束时判为编译错误（`go run` 模式）。
    #[serde(default)]
    pub build_failure_exit_code: Option<i32>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// 不计入内存用量的进程名（`/proc/<pid>/comm`），用于排除与被测程序
    /// 同处一个进程组的工具链进程，例如 `go run` 派生的编译器和链接器。
    #[serde(default)]
    pub unmetered_processes: Vec<String>,
}

impl ToolchainConfig {
    pub fn go_build() -> Self {
        Self {
            source_file: default_source_file(),
            build: Some(argv(&["go", "build", "-o", "{binary}", "{source}"])),
            build_timeout_ms: default_build_timeout_ms(),
            run: argv(&["{binary}"]),
            build_failure_exit_code: None,
            env: Vec::new(),
            unmetered_processes: Vec::new(),
        }
    }

    pub fn go_run() -> Self {
        Self {
            source_file: default_source_file(),
            build: None,
            build_timeout_ms: default_build_timeout_ms(),
            run: argv(&["go", "run", "{source}"]),
            build_failure_exit_code: Some(2),
            env: Vec::new(),
            unmetered_processes: argv(&["go", "compile", "link", "asm", "cgo"]),
        }
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self::go_build()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn default_scratch_root() -> PathBuf {
    PathBuf::from("code")
}

fn default_watchdog_factor() -> u32 {
    2
}

fn default_sample_interval_ms() -> u64 {
    10
}

fn default_source_file() -> String {
    "main.go".to_string()
}

fn default_build_timeout_ms() -> u64 {
    30_000
}

fn default_allowed_imports() -> Vec<String> {
    argv(&["bytes", "fmt", "math", "sort", "strings"])
}
