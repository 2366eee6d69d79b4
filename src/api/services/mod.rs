//! HTTP handlers: `downloads` for the downloads service, `events` for the
//! events service. Liveness is shared.

pub mod downloads;
pub mod events;

use std::collections::BTreeMap;

use axum::{Json, http::StatusCode};

use super::models::HealthResponse;
use crate::observability::MetricsSnapshot;
use crate::queue::ActorState;

/// Liveness probe (GET /alive)
pub async fn alive() -> &'static str {
    "ok"
}

/// 503 once the service's actor has terminated, 200 otherwise
fn health_response(
    actor: ActorState,
    components: BTreeMap<String, String>,
    metrics: MetricsSnapshot,
) -> (StatusCode, Json<HealthResponse>) {
    let healthy = actor != ActorState::Terminated
        && components.values().all(|status| !status.starts_with("unhealthy"));

    let (status_code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: status.to_string(),
        components,
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
