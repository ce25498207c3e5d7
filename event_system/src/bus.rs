//! Subscribe/dispatch bus for lifecycle events

use crate::event::{EntityEvent, LifecycleEvent};
use crate::types::EventListener;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Event bus for entity lifecycle notifications
///
/// Listeners subscribe per event kind and run in subscription order. The
/// first listener failure aborts the dispatch and propagates to the caller.
pub struct EventBus {
    listeners: RwLock<HashMap<LifecycleEvent, Vec<EventListener>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listener_count", &self.total_listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a listener to one event kind
    pub fn subscribe<F, Fut>(&self, kind: LifecycleEvent, listener: F)
    where
        F: Fn(EntityEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let listener: EventListener = Arc::new(
            move |event| -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(listener(event)) },
        );
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.entry(kind).or_default().push(listener);
        }
    }

    /// Whether any listener is subscribed to the given kind
    ///
    /// Callers use this to skip building an event payload when nobody is
    /// listening.
    pub fn has_listeners(&self, kind: LifecycleEvent) -> bool {
        self.listeners
            .read()
            .map(|listeners| listeners.get(&kind).is_some_and(|set| !set.is_empty()))
            .unwrap_or(false)
    }

    /// Dispatch an event to every subscriber of its kind
    ///
    /// Listeners run sequentially; the first error stops dispatch and is
    /// returned to the caller.
    pub async fn dispatch(&self, event: EntityEvent) -> anyhow::Result<()> {
        let subscribed: Vec<EventListener> = self
            .listeners
            .read()
            .map(|listeners| listeners.get(&event.kind).cloned().unwrap_or_default())
            .unwrap_or_default();

        tracing::trace!(
            kind = %event.kind,
            entity = %event.entity_name,
            listeners = subscribed.len(),
            "dispatching lifecycle event"
        );

        for listener in subscribed {
            listener(event.clone()).await?;
        }
        Ok(())
    }

    /// Drop every subscription
    pub fn clear(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }

    /// Number of listeners subscribed to one kind
    pub fn listener_count(&self, kind: LifecycleEvent) -> usize {
        self.listeners
            .read()
            .map(|listeners| listeners.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn total_listener_count(&self) -> usize {
        self.listeners
            .read()
            .map(|listeners| listeners.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn dispatch_reaches_every_listener_of_the_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            bus.subscribe(LifecycleEvent::PostPersist, move |_event| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        bus.dispatch(EntityEvent::new(LifecycleEvent::PostPersist, "customer"))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn dispatch_does_not_cross_kinds() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        bus.subscribe(LifecycleEvent::PreRemove, move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        bus.dispatch(EntityEvent::new(LifecycleEvent::PostRemove, "customer"))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(bus.has_listeners(LifecycleEvent::PreRemove));
        assert!(!bus.has_listeners(LifecycleEvent::PostRemove));
    }

    #[tokio::test]
    async fn first_failure_aborts_dispatch() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(LifecycleEvent::PreUpdate, |_event| async {
            anyhow::bail!("listener rejected the change")
        });
        let counter = hits.clone();
        bus.subscribe(LifecycleEvent::PreUpdate, move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let result = bus
            .dispatch(EntityEvent::new(LifecycleEvent::PreUpdate, "customer"))
            .await;
        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_drops_subscriptions() {
        let bus = EventBus::new();
        bus.subscribe(LifecycleEvent::PrePersist, |_event| async { Ok(()) });
        assert_eq!(bus.listener_count(LifecycleEvent::PrePersist), 1);

        bus.clear();
        assert_eq!(bus.listener_count(LifecycleEvent::PrePersist), 0);
    }
}
