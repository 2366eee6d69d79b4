use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job {0} is not complete, refusing to dequeue")]
    NotComplete(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Which end of the queue `peek` and `dequeue` read from.
///
/// New items always land at the back. `Lifo` serves the newest item first
/// (the long-standing behaviour of both services), `Fifo` the oldest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
    #[default]
    Lifo,
    Fifo,
}

/// Items that must be fully processed before they may leave the queue.
pub trait Completion {
    fn job_id(&self) -> &str;
    fn is_complete(&self) -> bool;
}

#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    item: T,
}

/// JobQueue holds pending work for a single actor
///
/// Every enqueued item gets a sequence number so the actor can write
/// progress back to the exact entry it peeked, even when two entries
/// share a job id.
#[derive(Debug, Clone)]
pub struct JobQueue<T> {
    entries: VecDeque<Entry<T>>,
    policy: OrderingPolicy,
    next_seq: u64,
}

impl<T> JobQueue<T> {
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            policy,
            next_seq: 0,
        }
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// Append an item and return its sequence number
    pub fn enqueue(&mut self, item: T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(Entry { seq, item });
        seq
    }

    /// The item `dequeue` would remove next
    pub fn peek(&self) -> Option<&T> {
        self.next_entry().map(|entry| &entry.item)
    }

    /// Like `peek`, with the entry's sequence number
    pub fn peek_entry(&self) -> Option<(u64, &T)> {
        self.next_entry().map(|entry| (entry.seq, &entry.item))
    }

    /// Remove and return the next item. An empty queue is not an error.
    pub fn dequeue(&mut self) -> Option<T> {
        let entry = match self.policy {
            OrderingPolicy::Lifo => self.entries.pop_back(),
            OrderingPolicy::Fifo => self.entries.pop_front(),
        };
        entry.map(|entry| entry.item)
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|entry| entry.seq == seq)
            .map(|entry| &mut entry.item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_entry(&self) -> Option<&Entry<T>> {
        match self.policy {
            OrderingPolicy::Lifo => self.entries.back(),
            OrderingPolicy::Fifo => self.entries.front(),
        }
    }
}

impl<T: Completion> JobQueue<T> {
    /// Dequeue the next item only if it is complete.
    ///
    /// On `NotComplete` the queue is left untouched.
    pub fn dequeue_completed(&mut self) -> Result<Option<T>> {
        match self.peek() {
            None => Ok(None),
            Some(item) if !item.is_complete() => {
                Err(QueueError::NotComplete(item.job_id().to_string()))
            }
            Some(_) => Ok(self.dequeue()),
        }
    }
}
