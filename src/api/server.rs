use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{
    services::{download, health, job_status, preview, receive_callback, serve_file},
    state::AppState,
};
use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::extraction::YtDlpExtractor;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::relay::Relay;
use crate::remote::{RemoteTrigger, WorkflowDispatcher};
use crate::strategy::Strategy;
use crate::sweeper::Sweeper;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Routes over a fully built state
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes.as_u64() as usize;

    Router::new()
        .route("/download", post(download))
        .route("/preview", post(preview))
        .route("/status/{job_id}", get(job_status))
        .route("/callback", post(receive_callback))
        .route("/files/{filename}", get(serve_file))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
}

/// Loads configuration, wires every component and serves until shutdown
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.artifact_dir.display(), "Opening artifact store");
    let artifacts = ArtifactStore::open(&config.server.artifact_dir)
        .map_err(|e| format!("Failed to open artifact store: {}", e))?;

    let strategy = Strategy::from_config(&config.extractor)?;
    let extractor = Arc::new(YtDlpExtractor::from_config(
        &config.extractor,
        artifacts.root(),
    ));
    let trigger = Arc::new(WorkflowDispatcher::from_config(&config.remote)?);
    if !trigger.is_configured() {
        warn!("Remote worker credentials missing, blocked downloads will not be escalated");
    }

    let registry = Arc::new(JobRegistry::new());
    let metrics = Arc::new(Metrics::new());
    let relay = Arc::new(Relay::new(
        strategy,
        extractor,
        trigger,
        registry.clone(),
        metrics.clone(),
    ));

    let _sweeper =
        Sweeper::from_config(&config.retention, artifacts.clone(), registry, metrics).spawn();

    let state = AppState::new(config, relay, artifacts);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediarelay listening");

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
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
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
