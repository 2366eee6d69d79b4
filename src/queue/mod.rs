//! Single-consumer job queues
//!
//! A queue is shared between request handlers (producers) and exactly one
//! [`JobActor`]. Producers go through a [`JobSubmitter`], which enqueues and
//! then signals the actor over a one-slot wake channel.

pub mod actor;
pub mod broker;
pub mod store;

pub use actor::{ActorHandle, ActorState, ActorStatus, JobActor, JobProcessor};
pub use broker::{JobSubmitter, SharedQueue, Wake, WakeReceiver, WakeSender, wake_channel};
pub use store::{Completion, JobQueue, OrderingPolicy, QueueError};
