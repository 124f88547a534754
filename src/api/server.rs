use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::services::ServeDir;
use tracing::info;

use super::{
    services::{
        get_all_progress, get_progress, health, serve_download, submit_download, submit_downloads,
    },
    state::AppState,
};
use crate::config::Config;
use crate::extractor::{Toolchain, YtDlpExtractor};
use crate::ledger::spawn_reaper;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Assemble the HTTP router for `state`
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/download", post(submit_download))
        .route("/api/downloads", post(submit_downloads))
        .route("/api/progress", get(get_all_progress))
        .route("/api/progress/{task_id}", get(get_progress))
        .route("/downloads/{filename}", get(serve_download))
        .route("/health", get(health));

    // Any other path falls through to the bundled frontend, if configured
    if let Some(static_dir) = &state.config.server.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    let cors = state.config.server.cors;
    let router = router
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address: SocketAddr = config.server.bind_addr;

    info!(path = %config.server.downloads_dir.display(), "Preparing downloads directory");
    tokio::fs::create_dir_all(&config.server.downloads_dir)
        .await
        .map_err(|e| format!("Failed to create downloads directory: {}", e))?;

    let toolchain = Toolchain::discover(&config.extractor);
    let extractor = Arc::new(YtDlpExtractor::new(toolchain, &config.extractor));

    let retention = config.retention.clone();
    let state = AppState::new(config, extractor);

    let reaper = retention.task_ttl.map(|ttl| {
        info!(ttl = %ttl, interval = %retention.prune_interval, "Task record eviction enabled");
        spawn_reaper(
            state.ledger.clone(),
            ttl.as_duration(),
            retention.prune_interval.as_duration(),
        )
    });

    let pool = state.pool.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "audiobox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    pool.shutdown();

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
