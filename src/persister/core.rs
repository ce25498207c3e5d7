//! Persister construction, gateway registry, and shared internals

use crate::backend::QueryBackend;
use crate::errors::PersistError;
use crate::gateway::Table;
use crate::identity::{Identifier, IdentityMap, Managed};
use crate::mapping::EntityMapping;
use event_system::{EntityEvent, EventBus, LifecycleEvent};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type GatewayFactory =
    Box<dyn Fn() -> Result<Arc<dyn Any + Send + Sync>, PersistError> + Send + Sync>;

/// Lazily-instantiated map from entity name to gateway instance
///
/// Gateways are registered at persister construction; requesting an entity
/// name that was never registered is a configuration error.
pub(crate) struct GatewayRegistry {
    factories: HashMap<&'static str, GatewayFactory>,
    instances: Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl GatewayRegistry {
    fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn register<T: EntityMapping>(&mut self) {
        self.factories.insert(
            T::entity_name(),
            Box::new(|| {
                let table: Table<T> = Table::new()?;
                Ok(Arc::new(table) as Arc<dyn Any + Send + Sync>)
            }),
        );
    }

    pub(crate) fn get<T: EntityMapping>(&self) -> Result<Arc<Table<T>>, PersistError> {
        let name = T::entity_name();
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let instance = match instances.get(name) {
            Some(instance) => Arc::clone(instance),
            None => {
                let factory = self.factories.get(name).ok_or_else(|| {
                    PersistError::Configuration(format!(
                        "no gateway registered for entity '{}'",
                        name
                    ))
                })?;
                let instance = factory()?;
                instances.insert(name, Arc::clone(&instance));
                tracing::debug!(entity = name, "instantiated table gateway");
                instance
            }
        };

        instance.downcast::<Table<T>>().map_err(|_| {
            PersistError::Configuration(format!(
                "gateway registered for entity '{}' is not a Table<{}>",
                name,
                std::any::type_name::<T>()
            ))
        })
    }
}

/// Builder for a [`Persister`]
///
/// Gateway registration is fixed at build time; the event bus defaults to
/// an empty one.
pub struct PersisterBuilder {
    backend: Arc<dyn QueryBackend>,
    events: Arc<EventBus>,
    registry: GatewayRegistry,
}

impl PersisterBuilder {
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Register an entity type with its default table gateway
    pub fn register<T: EntityMapping>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    pub fn build(self) -> Persister {
        Persister {
            inner: Arc::new(PersisterInner {
                backend: self.backend,
                events: self.events,
                registry: self.registry,
                map: Mutex::new(IdentityMap::new()),
            }),
        }
    }
}

pub(crate) struct PersisterInner {
    pub(crate) backend: Arc<dyn QueryBackend>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) registry: GatewayRegistry,
    pub(crate) map: Mutex<IdentityMap>,
}

/// Identity-map-backed persister for one unit of work
///
/// Cheap to clone; clones share the same identity map, gateway registry,
/// backend, and event bus. Create one persister per logical request and
/// let it die with the request.
#[derive(Clone)]
pub struct Persister {
    pub(crate) inner: Arc<PersisterInner>,
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("gateways", &self.inner.registry.factories.len())
            .field("map", &*self.map())
            .finish()
    }
}

impl Persister {
    pub fn builder(backend: Arc<dyn QueryBackend>) -> PersisterBuilder {
        PersisterBuilder {
            backend,
            events: Arc::new(EventBus::new()),
            registry: GatewayRegistry::new(),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    pub(crate) fn backend(&self) -> &dyn QueryBackend {
        self.inner.backend.as_ref()
    }

    pub(crate) fn gateway<T: EntityMapping>(&self) -> Result<Arc<Table<T>>, PersistError> {
        self.inner.registry.get::<T>()
    }

    pub(crate) fn map(&self) -> MutexGuard<'_, IdentityMap> {
        self.inner.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the managed instance for an identifier, if one is registered
    pub(crate) fn managed_for<T: EntityMapping>(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Managed<T>>, PersistError> {
        let Some(object) = self.map().get(T::entity_name(), identifier) else {
            return Ok(None);
        };
        let object = object.downcast::<Mutex<T>>().map_err(|_| {
            PersistError::Configuration(format!(
                "identity map entry for '{}' ({}) is not an instance of {}",
                T::entity_name(),
                identifier,
                std::any::type_name::<T>()
            ))
        })?;
        Ok(Some(Managed::from_arc(object)))
    }

    /// Dispatch a lifecycle event, building the payload only when someone
    /// is listening. Listener failures abort the enclosing operation.
    pub(crate) async fn emit(
        &self,
        kind: LifecycleEvent,
        build: impl FnOnce() -> EntityEvent,
    ) -> Result<(), PersistError> {
        if !self.inner.events.has_listeners(kind) {
            return Ok(());
        }
        self.inner
            .events
            .dispatch(build())
            .await
            .map_err(PersistError::Listener)
    }
}
