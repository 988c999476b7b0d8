mod api;
mod config;
mod db;
mod entity;
mod gateway;
mod repository;
mod service;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use goj_judge::{EventStream, JudgeEngine, JudgeEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{AppState, create_router};
use crate::config::ServerConfig;
use crate::gateway::SeaOrmJudgementGateway;
use crate::repository::{SeaOrmProblemRepository, SeaOrmSubmissionRepository, SeaOrmUserRepository};
use crate::service::SubmissionService;

const DEFAULT_CONFIG_PATH: &str = "goj.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    info!("starting goj server");
    let config = load_config()?;

    let db = db::init_pool_and_migrate()
        .await
        .context("failed to initialize database")?;
    info!("database migrated");

    let engine = JudgeEngine::new(config.judge).context("failed to initialize judge engine")?;
    let source_file = engine.config().toolchain.source_file.clone();
    tokio::spawn(log_judge_events(engine.subscribe_events()));

    let problems = Arc::new(SeaOrmProblemRepository::new(db.clone()));
    let users = Arc::new(SeaOrmUserRepository::new(db.clone()));
    let gateway = Arc::new(SeaOrmJudgementGateway::new(db.clone()));
    let submissions = SubmissionService::new(
        Arc::new(engine),
        problems,
        users,
        gateway,
        config.upload_dir.clone(),
        source_file,
    );
    let state = AppState::new(
        Arc::new(submissions),
        Arc::new(SeaOrmSubmissionRepository::new(db)),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(bind = %config.bind, upload_dir = %config.upload_dir.display(), "server is ready, press Ctrl+C to shut down");

    axum::serve(listener, create_router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shutdown complete");
    Ok(())
}

/// 配置路径来自 `GOJ_CONFIG`，文件不存在时使用默认配置。
fn load_config() -> anyhow::Result<ServerConfig> {
    let path = std::env::var("GOJ_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        info!(%path, "loading server config");
        ServerConfig::from_file(&path)
    } else {
        warn!(%path, "config file not found, using defaults");
        Ok(ServerConfig::default())
    }
}

async fn log_judge_events(mut events: EventStream) {
    loop {
        match events.recv().await {
            Ok(JudgeEvent::VerdictReached {
                submission_id,
                status,
                message,
            }) => info!(%submission_id, %status, %message, "verdict reached"),
            Ok(event) => debug!(?event, "judge event"),
            Err(err) => {
                warn!(error = %err, "failed to receive judge event");
                // Lagged receivers keep going; a closed channel ends the loop.
                if matches!(err.downcast_ref::<RecvError>(), Some(RecvError::Closed)) {
                    break;
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, stopping server");
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}
