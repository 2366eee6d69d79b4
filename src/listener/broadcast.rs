use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::Connection;

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// BroadcastGroup is the set of public event subscribers
///
/// Registration appends without deduplication. A broadcast writes to a
/// snapshot of the group concurrently, then in a second pass removes and
/// closes only the connections whose write failed.
pub struct BroadcastGroup {
    members: Mutex<Vec<Connection>>,
    write_timeout: Duration,
}

impl BroadcastGroup {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            write_timeout,
        }
    }

    pub fn register(&self, conn: Connection) {
        let mut members = self.members.lock();
        members.push(conn);
        info!(subscribers = members.len(), "Event subscriber registered");
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Forget a connection whose client went away
    pub fn remove(&self, connection: Uuid) -> bool {
        let mut members = self.members.lock();
        let before = members.len();
        members.retain(|member| member.id() != connection);
        before != members.len()
    }

    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let snapshot = self.members.lock().clone();
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let deadline = self.write_timeout;
        let writes = snapshot.iter().map(|conn| async move {
            let result = conn.send(text.to_string(), deadline).await;
            (conn, result)
        });

        let mut failed = Vec::new();
        let mut delivered = 0;
        for (conn, result) in join_all(writes).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(connection = %conn.id(), error = %e, "Event write failed");
                    failed.push(conn.clone());
                }
            }
        }

        if !failed.is_empty() {
            let failed_ids: HashSet<Uuid> = failed.iter().map(Connection::id).collect();
            self.members
                .lock()
                .retain(|member| !failed_ids.contains(&member.id()));

            for conn in &failed {
                conn.close(deadline).await;
            }
        }

        BroadcastReport {
            delivered,
            dropped: failed.len(),
        }
    }

    /// Close and forget every subscriber
    pub async fn close_all(&self) {
        let members = std::mem::take(&mut *self.members.lock());
        for conn in &members {
            conn.close(self.write_timeout).await;
        }
        info!(closed = members.len(), "Event subscribers closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ChannelListener, Frame};
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let group = BroadcastGroup::new(Duration::from_millis(100));
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (listener, rx) = ChannelListener::pair(4);
            group.register(Connection::new(listener));
            receivers.push(rx);
        }

        let report = group.broadcast("event").await;
        assert_eq!(report, BroadcastReport { delivered: 3, dropped: 0 });

        for rx in &mut receivers {
            assert_eq!(drain(rx), vec![Frame::Text("event".to_string())]);
        }
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_closed_and_bystanders_are_not() {
        let group = BroadcastGroup::new(Duration::from_millis(50));

        let (first, mut first_rx) = ChannelListener::pair(4);
        // Capacity one and pre-filled: the next write stalls until the deadline.
        let (stalled, mut stalled_rx) = ChannelListener::pair(1);
        let stalled = Connection::new(stalled);
        stalled
            .send("backlog".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        let (last, mut last_rx) = ChannelListener::pair(4);

        group.register(Connection::new(first));
        group.register(stalled);
        group.register(Connection::new(last));

        let report = group.broadcast("event").await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 1 });
        assert_eq!(group.len(), 2);

        // Only the delivered event, no close frame for subscribers that were fine.
        assert_eq!(drain(&mut first_rx), vec![Frame::Text("event".to_string())]);
        assert_eq!(drain(&mut last_rx), vec![Frame::Text("event".to_string())]);

        // Free the stalled buffer: its close attempt timed out, and it got no event.
        assert_eq!(drain(&mut stalled_rx), vec![Frame::Text("backlog".to_string())]);

        let report = group.broadcast("second").await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
    }

    #[tokio::test]
    async fn test_disconnected_subscriber_gets_close_attempt() {
        let group = BroadcastGroup::new(Duration::from_millis(50));
        let (gone, gone_rx) = ChannelListener::pair(4);
        let (stays, mut stays_rx) = ChannelListener::pair(4);
        group.register(Connection::new(gone));
        group.register(Connection::new(stays));
        drop(gone_rx);

        let report = group.broadcast("event").await;
        assert_eq!(report.dropped, 1);
        assert_eq!(group.len(), 1);
        assert_eq!(drain(&mut stays_rx), vec![Frame::Text("event".to_string())]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_receives_twice() {
        let group = BroadcastGroup::new(Duration::from_millis(100));
        let (listener, mut rx) = ChannelListener::pair(4);
        let conn = Connection::new(listener);
        group.register(conn.clone());
        group.register(conn.clone());

        group.broadcast("event").await;
        assert_eq!(drain(&mut rx).len(), 2);

        assert!(group.remove(conn.id()));
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_sends_close_frames() {
        let group = BroadcastGroup::new(Duration::from_millis(100));
        let (listener, mut rx) = ChannelListener::pair(4);
        group.register(Connection::new(listener));

        group.close_all().await;
        assert!(group.is_empty());
        assert_eq!(drain(&mut rx), vec![Frame::Close]);
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_group() {
        let group = BroadcastGroup::new(Duration::from_millis(100));
        assert_eq!(group.broadcast("event").await, BroadcastReport::default());
    }
}
