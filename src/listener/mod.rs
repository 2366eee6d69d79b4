//! Live listener connections and the registries that fan updates out to them
//!
//! - [`ProgressListeners`]: at most one connection per download id, single-shot
//! - [`BroadcastGroup`]: every subscriber receives every public event
//!
//! Writes go through [`Connection::send`], which bounds each write with a
//! deadline so one stalled client cannot hold up the actor feeding it.

pub mod broadcast;
#[cfg(test)]
mod channel;
pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub use broadcast::{BroadcastGroup, BroadcastReport};
pub use progress::ProgressListeners;

#[cfg(test)]
pub(crate) use channel::{ChannelListener, Frame};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("A listener is already registered for download {0}")]
    AlreadyRegistered(String),

    #[error("Listener write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Listener connection closed")]
    Closed,

    #[error("Listener write failed: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, ListenerError>;

/// Outbound half of a client connection
#[async_trait]
pub trait Listener: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Send a close frame. Errors are ignored, the peer may already be gone.
    async fn close(&mut self);
}

/// A registered listener, cheap to clone and shared between registry and writers
#[derive(Clone)]
pub struct Connection {
    id: Uuid,
    inner: Arc<Mutex<Box<dyn Listener>>>,
}

impl Connection {
    pub fn new(listener: impl Listener) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(Mutex::new(Box::new(listener))),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Write one text frame, giving up after `deadline`
    pub async fn send(&self, text: String, deadline: Duration) -> Result<()> {
        let write = async {
            let mut listener = self.inner.lock().await;
            listener.send_text(text).await
        };

        match tokio::time::timeout(deadline, write).await {
            Ok(result) => result,
            Err(_) => Err(ListenerError::Timeout(deadline)),
        }
    }

    /// Send a close frame, giving up after `deadline`
    pub async fn close(&self, deadline: Duration) {
        let close = async {
            let mut listener = self.inner.lock().await;
            listener.close().await;
        };

        if tokio::time::timeout(deadline, close).await.is_err() {
            debug!(connection = %self.id, "Close frame timed out");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Websocket sink half, as produced by `WebSocket::split`
pub struct WsListener {
    sink: SplitSink<WebSocket, Message>,
}

impl WsListener {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Listener for WsListener {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ListenerError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
