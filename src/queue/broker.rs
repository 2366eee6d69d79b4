use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

use super::store::{Completion, JobQueue, OrderingPolicy, Result};

/// Signal delivered to an actor over its wake channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The queue changed
    Work,
    /// Stop after the current job
    Shutdown,
}

/// Create the single-slot wake channel shared by producers and one actor.
///
/// Capacity is one: a producer can be at most one un-consumed wake ahead
/// of the actor, further `wake()` calls wait until the actor receives.
pub fn wake_channel() -> (WakeSender, WakeReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (WakeSender(tx), WakeReceiver(rx))
}

#[derive(Debug, Clone)]
pub struct WakeSender(mpsc::Sender<Wake>);

impl WakeSender {
    /// Returns false when the actor is gone
    pub async fn wake(&self) -> bool {
        self.0.send(Wake::Work).await.is_ok()
    }

    pub async fn shutdown(&self) -> bool {
        self.0.send(Wake::Shutdown).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

#[derive(Debug)]
pub struct WakeReceiver(mpsc::Receiver<Wake>);

impl WakeReceiver {
    /// Wait for the next signal. All senders dropped reads as shutdown.
    pub async fn recv(&mut self) -> Wake {
        self.0.recv().await.unwrap_or(Wake::Shutdown)
    }

    /// Drain pending signals without waiting, reporting whether any of
    /// them asked for shutdown.
    pub fn shutdown_pending(&mut self) -> bool {
        loop {
            match self.0.try_recv() {
                Ok(Wake::Work) => continue,
                Ok(Wake::Shutdown) | Err(TryRecvError::Disconnected) => return true,
                Err(TryRecvError::Empty) => return false,
            }
        }
    }
}

/// SharedQueue is the one place queue state lives
///
/// Producers and the actor both go through the mutex. The guard is not
/// `Send`, so it cannot be held across an `.await` inside a spawned task.
#[derive(Debug)]
pub struct SharedQueue<T> {
    inner: Arc<Mutex<JobQueue<T>>>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedQueue<T> {
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JobQueue::new(policy))),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, JobQueue<T>> {
        self.inner.lock()
    }

    pub fn enqueue(&self, item: T) -> u64 {
        self.inner.lock().enqueue(item)
    }

    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock().dequeue()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<T: Clone> SharedQueue<T> {
    /// Snapshot of the next item and its sequence number
    pub fn peek(&self) -> Option<(u64, T)> {
        self.inner
            .lock()
            .peek_entry()
            .map(|(seq, item)| (seq, item.clone()))
    }
}

impl<T: Completion> SharedQueue<T> {
    pub fn dequeue_completed(&self) -> Result<Option<T>> {
        self.inner.lock().dequeue_completed()
    }
}

/// JobSubmitter is the producer side of an actor
///
/// `submit` enqueues and then wakes the actor, in that order, so the
/// actor never observes a wake without the work that caused it.
#[derive(Debug)]
pub struct JobSubmitter<T> {
    queue: SharedQueue<T>,
    wake: WakeSender,
}

impl<T> Clone for JobSubmitter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            wake: self.wake.clone(),
        }
    }
}

impl<T> JobSubmitter<T> {
    pub fn new(queue: SharedQueue<T>, wake: WakeSender) -> Self {
        Self { queue, wake }
    }

    pub fn queue(&self) -> &SharedQueue<T> {
        &self.queue
    }

    /// Enqueue an item and wake the actor exactly once.
    ///
    /// Waits while a previous wake is still unconsumed.
    pub async fn submit(&self, item: T) -> u64 {
        let seq = self.queue.enqueue(item);
        debug!(seq, depth = self.queue.len(), "Job enqueued");

        if !self.wake.wake().await {
            warn!(seq, "Actor channel closed, job stays queued");
        }

        seq
    }

    /// Ask the actor to stop. Queued jobs are abandoned.
    pub async fn shutdown(&self) {
        if !self.wake.shutdown().await {
            debug!("Actor already stopped");
        }
    }

    /// Whether the receiving actor is still running
    pub fn health_check(&self) -> bool {
        !self.wake.is_closed()
    }
}
