use std::sync::Arc;

use tracing::{info, warn};

use super::{EventClass, EventCrier, EventError, EventStore, PlatformEvent, Result};
use crate::auth::TokenVerifier;
use crate::observability::Metrics;

/// Admission path for inbound platform events
///
/// verify signature -> store -> announce if public. A rejected event
/// leaves no trace in the store or the announcement queue.
pub struct EventIngest {
    verifier: TokenVerifier,
    store: Arc<dyn EventStore>,
    crier: Arc<EventCrier>,
    metrics: Arc<Metrics>,
}

impl EventIngest {
    pub fn new(
        verifier: TokenVerifier,
        store: Arc<dyn EventStore>,
        crier: Arc<EventCrier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            verifier,
            store,
            crier,
            metrics,
        }
    }

    pub async fn emit(&self, event: PlatformEvent) -> Result<EventClass> {
        if let Err(e) = self.verifier.verify(&event.event_payload) {
            warn!(event_id = %event.uuid, event_type = %event.event_type, error = %e, "Rejected unauthenticated event");
            self.metrics.event_rejected();
            return Err(EventError::Unauthenticated(e));
        }

        let class = event.class();
        self.store.register_event(event.clone());

        if class.is_public() {
            self.crier.announce(&event).await?;
        }

        self.metrics.event_admitted();
        info!(event_id = %event.uuid, event_type = %event.event_type, class = ?class, "Event admitted");
        Ok(class)
    }
}
