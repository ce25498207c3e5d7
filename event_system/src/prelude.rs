//! Convenience re-exports for event handling

pub use crate::bus::EventBus;
pub use crate::event::{EntityEvent, LifecycleEvent};
pub use crate::types::EventListener;
