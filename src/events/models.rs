use serde::{Deserialize, Serialize};

pub const CLUSTER_FS_CHANGE: &str = "cluster_fs_change";
pub const MEDIA_DELETED: &str = "media_deleted";
pub const MEDIA_ADDED: &str = "media_added";
pub const SYSTEM_LOG: &str = "system_log";
pub const FILE_SYSTEM_CHANGE: &str = "file_system_change";

pub const PUBLIC_EVENTS: [&str; 3] = [CLUSTER_FS_CHANGE, MEDIA_DELETED, MEDIA_ADDED];
pub const PRIVATE_EVENTS: [&str; 2] = [SYSTEM_LOG, FILE_SYSTEM_CHANGE];

/// A cross-service event. `event_payload` is the signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub uuid: String,
    pub event_type: String,
    pub event_message: String,
    pub event_payload: String,
}

/// Visibility of an event type
///
/// Types outside both well-known sets are accepted and stored like private
/// events, but never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    Public,
    Private,
    Unrecognized,
}

impl EventClass {
    pub fn of(event_type: &str) -> Self {
        if PUBLIC_EVENTS.contains(&event_type) {
            EventClass::Public
        } else if PRIVATE_EVENTS.contains(&event_type) {
            EventClass::Private
        } else {
            EventClass::Unrecognized
        }
    }

    pub fn is_public(self) -> bool {
        self == EventClass::Public
    }
}

impl PlatformEvent {
    pub fn class(&self) -> EventClass {
        EventClass::of(&self.event_type)
    }
}
