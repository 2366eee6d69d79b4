use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Listener, ListenerError, Result};

/// Frame observed on the receiving end of a [`ChannelListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

/// In-process listener backed by a bounded channel
///
/// A full channel behaves like a stalled client: writes wait until the
/// deadline expires.
pub struct ChannelListener {
    tx: mpsc::Sender<Frame>,
}

impl ChannelListener {
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Listener for ChannelListener {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.tx
            .send(Frame::Text(text))
            .await
            .map_err(|_| ListenerError::Closed)
    }

    async fn close(&mut self) {
        let _ = self.tx.send(Frame::Close).await;
    }
}
