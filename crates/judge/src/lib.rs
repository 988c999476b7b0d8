pub mod aggregator;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod runner;
pub mod sampler;
pub mod scratch;
pub mod validator;

pub use config::{EnvVar, JudgeConfig, SamplerKind, ToolchainConfig, ValidatorKind};
pub use engine::JudgeEngine;
pub use error::{JudgeError, Result};
pub use events::{EventBroadcaster, EventStream, JudgeEvent};
pub use job::JudgeJob;
pub use runner::{BuildOutcome, ExecutionOutcome, LocalProcessRunner, ProcessRunner, RunReport, Workspace};
pub use validator::{Admission, AllowList, CodeValidator};
