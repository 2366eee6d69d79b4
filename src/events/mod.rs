//! Platform events: classification, storage, authenticated ingestion and
//! broadcast to public subscribers

pub mod crier;
pub mod ingest;
pub mod models;
pub mod store;

pub use crier::{Announcer, EventCrier};
pub use ingest::EventIngest;
pub use models::{EventClass, PlatformEvent};
pub use store::{EventStore, MemoryEventStore};

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event type '{0}' is not public and cannot be broadcast")]
    NotPublic(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Event signature rejected: {0}")]
    Unauthenticated(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, EventError>;
