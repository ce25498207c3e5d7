//! Lifecycle event types and definitions
//!
//! This module defines the structure of the events that flow through the
//! bus around entity persistence operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The six lifecycle moments surrounding create, update, and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
}

impl LifecycleEvent {
    /// Wire name of the event, as listeners registered by name expect it.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PrePersist => "prePersist",
            LifecycleEvent::PostPersist => "postPersist",
            LifecycleEvent::PreUpdate => "preUpdate",
            LifecycleEvent::PostUpdate => "postUpdate",
            LifecycleEvent::PreRemove => "preRemove",
            LifecycleEvent::PostRemove => "postRemove",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEvent {
    /// Which lifecycle moment this event marks
    pub kind: LifecycleEvent,
    /// Entity (root) name the event relates to
    pub entity_name: String,
    /// String form of the entity identifier, when one is known
    pub record_id: Option<String>,
    /// Column-keyed values of the entity state relevant to the operation
    pub payload: HashMap<String, Value>,
    /// Original state before the change; carried by `preUpdate` only
    pub original: Option<HashMap<String, Value>>,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl EntityEvent {
    pub fn new(kind: LifecycleEvent, entity_name: impl Into<String>) -> Self {
        Self {
            kind,
            entity_name: entity_name.into(),
            record_id: None,
            payload: HashMap::new(),
            original: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_payload(mut self, payload: HashMap<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_original(mut self, original: HashMap<String, Value>) -> Self {
        self.original = Some(original);
        self
    }

    pub fn add_payload(&mut self, key: String, value: Value) {
        self.payload.insert(key, value);
    }
}
