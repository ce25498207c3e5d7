//! Listener callback types for the event bus

use crate::event::EntityEvent;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Async event listener that returns a Result
///
/// A failing listener aborts the dispatch; the error propagates to the
/// operation that fired the event.
pub type EventListener =
    Arc<dyn Fn(EntityEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
