use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{get_job, get_metadata, health, job_file, job_progress, job_snapshot, submit_job},
    state::AppState,
};
use crate::config::Config;
use crate::observability::Metrics;
use crate::worker::SystemRunner;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with their middleware, ready to serve
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", post(submit_job))
        .route("/api/jobs/{job_id}", get(get_job))
        .route("/api/jobs/{job_id}/progress", get(job_progress))
        .route("/api/jobs/{job_id}/snapshot", get(job_snapshot))
        .route("/api/jobs/{job_id}/file", get(job_file))
        .route("/api/metadata", get(get_metadata))
        .route("/health", get(health))
        .with_state(state)
        // Decodes gzip request bodies before the handlers see them
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until Ctrl+C or SIGTERM. `address` overrides `server.bind_addr`.
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);

    tokio::fs::create_dir_all(&config.downloader.download_dir)
        .await
        .map_err(|e| {
            format!(
                "Failed to create download dir {}: {}",
                config.downloader.download_dir.display(),
                e
            )
        })?;

    let metrics = Arc::new(Metrics::new());
    let runner = Arc::new(SystemRunner::new(metrics.clone()));
    let state = AppState::new(config, runner, metrics);

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediafetch API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
