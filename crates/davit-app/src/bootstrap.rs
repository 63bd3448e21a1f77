//! Boot sequence: configuration, logging, engine and pipeline wiring, the
//! purge sweep, and the API server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use davit_api::{AgentState, ApiServer, ApiSettings};
use davit_callback::HttpTransport;
use davit_config::AgentConfig;
use davit_pipeline::{JobPipeline, JobRegistry};
use davit_scan::ClamAvScanner;
use davit_telemetry::LoggingConfig;
use davit_torrent_engine::{SessionEngine, create_session};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::purge;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Entry point for the agent boot sequence.
///
/// # Errors
///
/// Returns an error when configuration, telemetry, or server startup fails.
/// Job-level failures never surface here; they are reported through
/// callbacks and the registry.
pub async fn run_app() -> AppResult<()> {
    let config = AgentConfig::from_env().map_err(|source| AppError::Config {
        operation: "config.from_env",
        source,
    })?;
    davit_telemetry::init_logging(&LoggingConfig::default()).map_err(|source| {
        AppError::Telemetry {
            operation: "telemetry.init",
            source,
        }
    })?;
    run_app_with(config).await
}

async fn run_app_with(config: AgentConfig) -> AppResult<()> {
    info!(
        worker_id = %config.worker_id,
        download_root = %config.download_root.display(),
        max_jobs = config.max_concurrent_jobs,
        "agent bootstrap starting"
    );

    std::fs::create_dir_all(&config.download_root).map_err(|source| AppError::Io {
        operation: "download_root.create",
        path: Some(config.download_root.clone()),
        source,
    })?;

    let session = create_session().map_err(|err| AppError::Engine {
        operation: "session.create",
        source: err.into(),
    })?;
    let engine = Arc::new(SessionEngine::with_session(session));
    let scanner = Arc::new(ClamAvScanner::new(&config.scanner_binary));
    let transport = Arc::new(HttpTransport::new().map_err(|source| AppError::Callback {
        operation: "transport.new",
        source,
    })?);
    let pipeline = Arc::new(JobPipeline::new(
        engine,
        scanner,
        transport,
        JobRegistry::new(),
        config.worker_id.clone(),
    ));

    let purge_task = purge::spawn_sweep(
        config.download_root.clone(),
        config.retention,
        PURGE_INTERVAL,
    );

    let state = AgentState::new(
        pipeline,
        ApiSettings {
            cluster_token: config.cluster_token.clone(),
            download_root: config.download_root.clone(),
            max_concurrent_jobs: config.max_concurrent_jobs,
            worker_id: config.worker_id.clone(),
        },
    );
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let serve_result = ApiServer::new(state).serve(addr, shutdown_signal()).await;

    if !purge_task.is_finished() {
        purge_task.abort();
    }

    serve_result.map_err(|source| AppError::ApiServer {
        operation: "api_server.serve",
        source,
    })?;
    info!("agent shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
