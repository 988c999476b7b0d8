use std::path::{Path, PathBuf};

use anyhow::Context;
use goj_judge::JudgeConfig;
use serde::Deserialize;

/// 服务端配置，默认从 `goj.toml` 读取。数据库地址来自环境变量 `DATABASE_URL`。
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// 用户提交的源码保存在该目录下，每次提交一个子目录。
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub judge: JudgeConfig,
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read server config: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("failed to parse server config: {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.judge.validate()?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
            judge: JudgeConfig::default(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
