//! Lifecycle event bus for persistence operations
//!
//! This crate provides the event types and the subscribe/dispatch bus used
//! to notify listeners around entity create, update, and delete operations.

pub mod bus;
pub mod event;
pub mod prelude;
pub mod types;

pub use bus::EventBus;
pub use event::{EntityEvent, LifecycleEvent};
pub use types::EventListener;
