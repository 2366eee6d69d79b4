use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::services::{alive, downloads, events};
use super::state::{DownloadsState, EventsState};
use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::downloads::DownloadManager;
use crate::events::{EventCrier, EventIngest, MemoryEventStore};
use crate::ledger::FjallStore;
use crate::listener::BroadcastGroup;
use crate::observability::Metrics;
use crate::storage::StorageClient;
use crate::worker::{HttpConfig, HttpFetcher};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn downloads_router(state: DownloadsState) -> Router {
    Router::new()
        .route("/alive", get(alive))
        .route("/health", get(downloads::health))
        .route("/downloads/batch", post(downloads::submit_batch))
        .route("/downloads/current-download", get(downloads::current_download))
        .route("/download-history/download", get(downloads::download_history))
        .route("/ws/download-progress", get(downloads::download_progress))
        .with_state(state)
        // Handles Content-Encoding transparently before the handlers read the body
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

pub fn events_router(state: EventsState) -> Router {
    Router::new()
        .route("/alive", get(alive))
        .route("/health", get(events::health))
        .route("/platform-events", post(events::emit_event))
        .route("/platform-events/public/subscribe", get(events::subscribe_public))
        .route("/platform-events/public/{id}", get(events::get_public_event))
        .route("/platform-events/private/{id}", get(events::get_private_event))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Wire the downloads service from configuration
pub fn build_downloads_state(config: Config) -> Result<DownloadsState, AnyError> {
    let cluster_tokens = TokenVerifier::new(config.domain_secret()?);

    info!(path = %config.server.ledger_path.display(), "Opening Fjall ledger");
    let ledger = Arc::new(
        FjallStore::open(&config.server.ledger_path)
            .map_err(|e| format!("Failed to open ledger: {e}"))?,
    );

    let storage = StorageClient::from_config(&config.storage)
        .map_err(|e| format!("Failed to initialise media storage: {e}"))?;
    let fetcher = HttpFetcher::new(HttpConfig::from(&config.downloads))
        .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

    let metrics = Arc::new(Metrics::new());
    let manager = DownloadManager::spawn(
        &config.downloads,
        Arc::new(fetcher),
        Arc::new(storage),
        ledger.clone(),
        metrics.clone(),
    );

    Ok(DownloadsState {
        config: Arc::new(config),
        manager: Arc::new(manager),
        ledger,
        cluster_tokens: Arc::new(cluster_tokens),
        metrics,
    })
}

/// Wire the events service from configuration
pub fn build_events_state(config: Config) -> Result<EventsState, AnyError> {
    let secret = config.jwt_secret()?;
    let metrics = Arc::new(Metrics::new());
    let store = Arc::new(MemoryEventStore::new());

    let subscribers = Arc::new(BroadcastGroup::new(Duration::from_millis(
        config.events.listener_write_timeout_ms,
    )));
    let crier = Arc::new(EventCrier::spawn(
        store.clone(),
        subscribers,
        config.events.ordering,
        metrics.clone(),
    ));
    let ingest = EventIngest::new(
        TokenVerifier::new(secret),
        store.clone(),
        crier.clone(),
        metrics.clone(),
    );

    Ok(EventsState {
        readers: Arc::new(TokenVerifier::new(secret)),
        ingest: Arc::new(ingest),
        store,
        crier,
        metrics,
        config: Arc::new(config),
    })
}

pub async fn run_downloads(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let state = build_downloads_state(config)?;
    let manager = state.manager.clone();
    let ledger = state.ledger.clone();

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Downloads service listening");

    axum::serve(listener, downloads_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown().await;
    if let Err(e) = ledger.persist() {
        error!(error = %e, "Failed to persist ledger on shutdown");
    }

    info!("Downloads service stopped");
    Ok(())
}

pub async fn run_events(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.events.bind_addr);
    let state = build_events_state(config)?;
    let crier = state.crier.clone();

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Events service listening");

    axum::serve(listener, events_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    crier.close().await;

    info!("Events service stopped");
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
