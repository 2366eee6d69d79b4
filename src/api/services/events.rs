use std::collections::BTreeMap;

use axum::{
    Json,
    body::Body,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tracing::debug;

use super::health_response;
use crate::api::error::ApiError;
use crate::api::models::EventAccepted;
use crate::api::state::EventsState;
use crate::api::utils::{bearer_token, read_json};
use crate::api::validation::validate_event;
use crate::events::PlatformEvent;
use crate::listener::{Connection, WsListener};

/// Event ingestion endpoint (POST /platform-events)
///
/// The payload must be a JWT signed with the shared secret. Accepted
/// events are stored; public ones are also queued for broadcast.
pub async fn emit_event(
    State(state): State<EventsState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let max_size = state.config.server.api.max_payload_bytes.as_usize();
    let event: PlatformEvent = read_json(&headers, body, max_size).await?;
    validate_event(&event).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let uuid = event.uuid.clone();
    let class = state.ingest.emit(event).await?;

    Ok((StatusCode::ACCEPTED, Json(EventAccepted { uuid, class })))
}

/// Public event websocket (GET /platform-events/public/subscribe)
pub async fn subscribe_public(State(state): State<EventsState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| subscriber_socket(state, socket))
}

async fn subscriber_socket(state: EventsState, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let conn = Connection::new(WsListener::new(sink));
    let conn_id = conn.id();
    state.crier.subscribe(conn);

    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    if state.crier.unsubscribe(conn_id) {
        debug!(connection = %conn_id, "Public subscriber disconnected");
    }
}

/// GET /platform-events/public/{id}
pub async fn get_public_event(
    State(state): State<EventsState>,
    Path(event_id): Path<String>,
) -> Result<Json<PlatformEvent>, ApiError> {
    Ok(Json(state.store.get_public_event(&event_id)?))
}

/// GET /platform-events/private/{id}, requires `Authorization: Bearer <jwt>`
pub async fn get_private_event(
    State(state): State<EventsState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<Json<PlatformEvent>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
    state
        .readers
        .verify(token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    Ok(Json(state.store.get_private_event(&event_id)?))
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<EventsState>) -> impl IntoResponse {
    let actor = state.crier.actor().status();

    let mut components = BTreeMap::new();
    components.insert("event_crier".to_string(), actor.state.as_str().to_string());
    components.insert(
        "pending_announcements".to_string(),
        state.crier.pending().to_string(),
    );
    components.insert(
        "public_subscribers".to_string(),
        state.crier.subscriber_count().to_string(),
    );

    health_response(actor.state, components, state.metrics.snapshot())
}
