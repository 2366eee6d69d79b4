use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Connection, ListenerError, Result};
use crate::downloads::ProgressMessage;

/// ProgressListeners maps a download id to its single progress subscriber
///
/// A listener is single-shot: it is closed and removed after the message
/// that marks its download complete, or after its first failed write.
/// Updates for a download nobody listens to are dropped.
pub struct ProgressListeners {
    listeners: Mutex<HashMap<String, Connection>>,
    write_timeout: Duration,
}

impl ProgressListeners {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            write_timeout,
        }
    }

    /// Register `conn` for `download_id`. An existing listener is kept.
    pub fn register(&self, download_id: &str, conn: Connection) -> Result<()> {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(download_id) {
            return Err(ListenerError::AlreadyRegistered(download_id.to_string()));
        }

        info!(download_id, connection = %conn.id(), "Progress listener registered");
        listeners.insert(download_id.to_string(), conn);
        Ok(())
    }

    pub fn is_registered(&self, download_id: &str) -> bool {
        self.listeners.lock().contains_key(download_id)
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Remove the listener for `download_id` if it is still `connection`.
    ///
    /// Used when the client side goes away; a newer registration for the
    /// same download is left alone.
    pub fn release(&self, download_id: &str, connection: Uuid) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get(download_id) {
            Some(conn) if conn.id() == connection => {
                listeners.remove(download_id);
                debug!(download_id, %connection, "Progress listener released");
                true
            }
            _ => false,
        }
    }

    /// Push one progress update to the download's listener, if any
    pub async fn report(&self, progress: &ProgressMessage) {
        let download_id = progress.download_uuid.as_str();
        let Some(conn) = self.listeners.lock().get(download_id).cloned() else {
            debug!(download_id, "No progress listener, update dropped");
            return;
        };

        let text = match serde_json::to_string(progress) {
            Ok(text) => text,
            Err(e) => {
                debug!(download_id, error = %e, "Failed to encode progress message");
                return;
            }
        };

        match conn.send(text, self.write_timeout).await {
            Ok(()) if progress.completed => {
                debug!(download_id, "Download complete, closing progress listener");
                self.detach(download_id, &conn).await;
            }
            Ok(()) => {}
            Err(e) => {
                debug!(download_id, error = %e, "Progress write failed, dropping listener");
                self.detach(download_id, &conn).await;
            }
        }
    }

    async fn detach(&self, download_id: &str, conn: &Connection) {
        self.release(download_id, conn.id());
        conn.close(self.write_timeout).await;
    }
}
