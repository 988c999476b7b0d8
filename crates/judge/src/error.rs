use std::path::PathBuf;

use goj_core::domain::JudgeFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("无法读取提交代码 {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("临时目录错误: {0}")]
    Scratch(String),

    #[error("无法启动进程 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("判题任务异常终止: {0}")]
    TaskAborted(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML 错误: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, JudgeError>;

impl From<JudgeError> for JudgeFailure {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::SourceUnreadable { .. } => JudgeFailure::SourceUnreadable(err.to_string()),
            other => JudgeFailure::Infrastructure(other.to_string()),
        }
    }
}
