use std::collections::BTreeMap;

use axum::{
    Json,
    body::Body,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::health_response;
use crate::api::error::ApiError;
use crate::api::models::{BatchAccepted, BatchRequest, CurrentDownload, DownloadHistory, DownloadQuery};
use crate::api::state::DownloadsState;
use crate::api::utils::read_json;
use crate::api::validation::validate_batch;
use crate::downloads::{BatchSubmission, Cluster};
use crate::listener::{Connection, WsListener};

/// Batch submission endpoint (POST /downloads/batch)
///
/// ## Flow:
/// 1. Content-Type and size checks, decode [`BatchRequest`]
/// 2. Validate URLs and category
/// 3. Verify the cluster token; its claims say where files are uploaded
/// 4. Hand the batch to the download actor
/// 5. Return 202 with the download id
pub async fn submit_batch(
    State(state): State<DownloadsState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let api = &state.config.server.api;
    let request: BatchRequest = read_json(&headers, body, api.max_payload_bytes.as_usize()).await?;
    validate_batch(&request, api.max_urls_per_batch)
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let cluster: Cluster = state
        .cluster_tokens
        .decode(&request.cluster_token)
        .map_err(|e| {
            warn!(error = %e, "Rejected batch with invalid cluster token");
            ApiError::Unauthorized(format!("cluster token: {e}"))
        })?;

    let submitted = state
        .manager
        .submit(BatchSubmission {
            cluster,
            category_id: request.category_id,
            urls: request.urls,
            download_id: request.download_uuid,
        })
        .await;

    let response = BatchAccepted {
        download_uuid: submitted.download_id,
        queued_files: submitted.queued_files,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /downloads/current-download
pub async fn current_download(State(state): State<DownloadsState>) -> Json<CurrentDownload> {
    Json(CurrentDownload {
        download_uuid: state.manager.current_download().unwrap_or_default(),
    })
}

/// GET /download-history/download?download_uuid=
pub async fn download_history(
    State(state): State<DownloadsState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadHistory>, ApiError> {
    let download_id = query
        .download_uuid()
        .ok_or_else(|| ApiError::InvalidPayload("download_uuid is required".into()))?;

    let record = state
        .manager
        .repository()
        .get(download_id)
        .map_err(|e| ApiError::Internal(format!("Failed to read ledger: {e}")))?;

    Ok(Json(match record {
        Some(record) => DownloadHistory {
            exists: true,
            download_count: record.files.len(),
        },
        None => DownloadHistory {
            exists: false,
            download_count: 0,
        },
    }))
}

/// Progress websocket (GET /ws/download-progress?download_uuid=)
///
/// One listener per download. A second client for the same id is refused
/// with 409 before the upgrade; if it slips past that check it is closed
/// right after the upgrade and the first listener is kept.
pub async fn download_progress(
    State(state): State<DownloadsState>,
    Query(query): Query<DownloadQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let download_id = query
        .download_uuid()
        .ok_or_else(|| ApiError::InvalidPayload("download_uuid is required".into()))?
        .to_string();

    if state.manager.has_listener(&download_id) {
        return Err(ApiError::Conflict(format!(
            "download {download_id} already has a progress listener"
        )));
    }

    Ok(ws.on_upgrade(move |socket| progress_socket(state, download_id, socket)))
}

async fn progress_socket(state: DownloadsState, download_id: String, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let conn = Connection::new(WsListener::new(sink));
    let conn_id = conn.id();
    let write_timeout = std::time::Duration::from_millis(state.config.downloads.listener_write_timeout_ms);

    if let Err(e) = state.manager.register_listener(&download_id, conn.clone()) {
        debug!(download_id = %download_id, error = %e, "Closing duplicate progress listener");
        conn.close(write_timeout).await;
        return;
    }

    // Progress flows one way; the client side only matters for hang-up
    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    if state.manager.release_listener(&download_id, conn_id) {
        info!(download_id = %download_id, connection = %conn_id, "Progress listener left early");
    }
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<DownloadsState>) -> impl IntoResponse {
    let actor = state.manager.actor().status();

    let mut components = BTreeMap::new();
    components.insert("download_actor".to_string(), actor.state.as_str().to_string());
    components.insert("queued_batches".to_string(), state.manager.queued().to_string());
    components.insert(
        "ledger".to_string(),
        match state.ledger.stats() {
            Ok(stats) => format!("healthy ({} downloads, {} files)", stats.download_count, stats.file_count),
            Err(e) => format!("unhealthy: {e}"),
        },
    );

    health_response(actor.state, components, state.metrics.snapshot())
}
