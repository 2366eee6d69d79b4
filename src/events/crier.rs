use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{EventError, EventStore, PlatformEvent, Result};
use crate::listener::{BroadcastGroup, Connection};
use crate::observability::Metrics;
use crate::queue::{
    ActorHandle, JobActor, JobProcessor, JobSubmitter, OrderingPolicy, SharedQueue, wake_channel,
};

/// Announcement worker: turns a queued event id into one broadcast
pub struct Announcer {
    store: Arc<dyn EventStore>,
    subscribers: Arc<BroadcastGroup>,
    metrics: Arc<Metrics>,
}

impl Announcer {
    pub fn new(
        store: Arc<dyn EventStore>,
        subscribers: Arc<BroadcastGroup>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            subscribers,
            metrics,
        }
    }

    async fn announce(&self, event_id: &str) {
        if self.subscribers.is_empty() {
            debug!(event_id, "No subscribers, skipping announcement");
            return;
        }

        let event = match self.store.get_public_event(event_id) {
            Ok(event) => event,
            Err(e) => {
                warn!(event_id, error = %e, "Queued event is not in the public store");
                return;
            }
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!(event_id, error = %e, "Failed to encode event");
                return;
            }
        };

        let report = self.subscribers.broadcast(&text).await;
        self.metrics.event_announced();
        info!(
            event_id,
            event_type = %event.event_type,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event announced"
        );
    }
}

#[async_trait]
impl JobProcessor for Announcer {
    type Item = String;

    fn name(&self) -> &'static str {
        "event-crier"
    }

    async fn process_next(&self, queue: &SharedQueue<String>) -> bool {
        let Some(event_id) = queue.dequeue() else {
            return false;
        };
        self.announce(&event_id).await;
        true
    }
}

/// EventCrier owns the announcement queue and the public subscriber group
pub struct EventCrier {
    submitter: JobSubmitter<String>,
    subscribers: Arc<BroadcastGroup>,
    actor: ActorHandle,
}

impl EventCrier {
    /// Start the announcement actor
    pub fn spawn(
        store: Arc<dyn EventStore>,
        subscribers: Arc<BroadcastGroup>,
        ordering: OrderingPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        let queue = SharedQueue::new(ordering);
        let (wake_tx, wake_rx) = wake_channel();

        let announcer = Announcer::new(store, subscribers.clone(), metrics);
        let actor = JobActor::new(announcer, queue.clone(), wake_rx).spawn();

        Self {
            submitter: JobSubmitter::new(queue, wake_tx),
            subscribers,
            actor,
        }
    }

    /// Queue a public event for broadcast. Anything else is refused.
    pub async fn announce(&self, event: &PlatformEvent) -> Result<()> {
        if !event.class().is_public() {
            return Err(EventError::NotPublic(event.event_type.clone()));
        }

        self.submitter.submit(event.uuid.clone()).await;
        Ok(())
    }

    pub fn subscribe(&self, conn: Connection) {
        self.subscribers.register(conn);
    }

    pub fn unsubscribe(&self, connection: Uuid) -> bool {
        self.subscribers.remove(connection)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn pending(&self) -> usize {
        self.submitter.queue().len()
    }

    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    /// Stop the actor and close every subscriber
    pub async fn close(&self) {
        self.submitter.shutdown().await;
        self.subscribers.close_all().await;
    }
}
