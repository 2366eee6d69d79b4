use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::broker::{SharedQueue, Wake, WakeReceiver};

/// Lifecycle of a job actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Idle,
    Processing,
    Terminated,
}

impl ActorState {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorState::Idle => "idle",
            ActorState::Processing => "processing",
            ActorState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActorStatus {
    pub state: ActorState,
    /// Jobs that have left the queue since start
    pub processed: u64,
}

/// The unit of work an actor performs
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Handle the next item. Called only when the queue is non-empty.
    ///
    /// Returns true when an item left the queue.
    async fn process_next(&self, queue: &SharedQueue<Self::Item>) -> bool;
}

/// JobActor is the single consumer of a queue
///
/// One actor per queue: it blocks on the wake channel while the queue is
/// empty and otherwise processes one job at a time. A shutdown signal is
/// honoured between jobs; anything still queued is abandoned.
pub struct JobActor<P: JobProcessor> {
    processor: P,
    queue: SharedQueue<P::Item>,
    wake: WakeReceiver,
    status: watch::Sender<ActorStatus>,
}

impl<P: JobProcessor> JobActor<P> {
    pub fn new(processor: P, queue: SharedQueue<P::Item>, wake: WakeReceiver) -> Self {
        let (status, _) = watch::channel(ActorStatus {
            state: ActorState::Idle,
            processed: 0,
        });

        Self {
            processor,
            queue,
            wake,
            status,
        }
    }

    /// Run the actor on its own task
    pub fn spawn(self) -> ActorHandle {
        let status = self.status.subscribe();
        let task = tokio::spawn(self.run());
        ActorHandle { status, task }
    }

    pub async fn run(mut self) {
        let name = self.processor.name();
        info!(actor = name, policy = ?self.queue.lock().policy(), "Actor started");

        loop {
            if self.queue.is_empty() {
                self.set_state(ActorState::Idle);
                match self.wake.recv().await {
                    Wake::Work => {
                        if self.queue.is_empty() {
                            continue;
                        }
                    }
                    Wake::Shutdown => break,
                }
            } else if self.wake.shutdown_pending() {
                break;
            }

            self.set_state(ActorState::Processing);
            if self.processor.process_next(&self.queue).await {
                self.status.send_modify(|status| status.processed += 1);
            }
        }

        let abandoned = self.queue.len();
        if abandoned > 0 {
            warn!(actor = name, abandoned, "Actor stopped with jobs still queued");
        }
        self.set_state(ActorState::Terminated);
        info!(actor = name, "Actor terminated");
    }

    fn set_state(&self, state: ActorState) {
        self.status.send_if_modified(|status| {
            if status.state == state {
                return false;
            }
            debug!(actor = self.processor.name(), from = ?status.state, to = ?state, "Actor state change");
            status.state = state;
            true
        });
    }
}

/// Observer of a running actor
pub struct ActorHandle {
    status: watch::Receiver<ActorStatus>,
    task: JoinHandle<()>,
}

impl ActorHandle {
    pub fn status(&self) -> ActorStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ActorState {
        self.status().state
    }

    /// Resolve once at least `count` jobs have left the queue
    pub async fn wait_processed(&self, count: u64) -> ActorStatus {
        self.wait_for(|status| status.processed >= count).await
    }

    pub async fn wait_for(&self, condition: impl Fn(&ActorStatus) -> bool) -> ActorStatus {
        let mut status = self.status.clone();
        // Err means the actor task ended; report what it last published.
        let _ = status.wait_for(|s| condition(s)).await;
        *status.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the actor task to end
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Actor task panicked");
        }
    }
}
