use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::{EventError, PlatformEvent, Result};

/// Where admitted events are kept for retrieval by id
pub trait EventStore: Send + Sync {
    /// Store an event. Public events go to the public side, everything else
    /// to the private side.
    fn register_event(&self, event: PlatformEvent);

    fn get_public_event(&self, id: &str) -> Result<PlatformEvent>;

    fn get_private_event(&self, id: &str) -> Result<PlatformEvent>;
}

/// Process-local event store
#[derive(Default)]
pub struct MemoryEventStore {
    public: RwLock<HashMap<String, PlatformEvent>>,
    private: RwLock<HashMap<String, PlatformEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.public.read().len() + self.private.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryEventStore {
    fn register_event(&self, event: PlatformEvent) {
        let side = if event.class().is_public() {
            &self.public
        } else {
            &self.private
        };
        debug!(event_id = %event.uuid, event_type = %event.event_type, "Event stored");
        side.write().insert(event.uuid.clone(), event);
    }

    fn get_public_event(&self, id: &str) -> Result<PlatformEvent> {
        self.public
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EventError::NotFound(id.to_string()))
    }

    fn get_private_event(&self, id: &str) -> Result<PlatformEvent> {
        self.private
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EventError::NotFound(id.to_string()))
    }
}
