//! Persister operations: create, retrieve, update, delete, and fetches

use crate::backend::Row;
use crate::errors::PersistError;
use crate::gateway::Table;
use crate::identity::{Managed, Snapshot};
use crate::mapping::{EntityMapping, KeyInput};
use crate::paginator::Paginator;
use crate::persister::Persister;
use crate::rql::RqlExpr;
use event_system::{EntityEvent, LifecycleEvent};
use serde_json::Value;

impl Persister {
    /// Insert a transient entity and start managing it
    ///
    /// Fires `prePersist` before any write; a rejecting listener aborts the
    /// create with no partial state, and an application-assigned identifier
    /// that is already managed is rejected before the insert for the same
    /// reason. On success the entity is registered in the identity map under
    /// its (possibly database-generated) identifier and `postPersist` fires.
    pub async fn create<T: EntityMapping>(&self, entity: T) -> Result<Managed<T>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let row = gateway.load_row(&entity);

        // With an application-assigned key the identifier is known up
        // front, so a collision is caught before any row is written.
        if !T::generated_key() {
            let identifier = gateway.primary_key_of_row(&row)?;
            if self.managed_for::<T>(&identifier)?.is_some() {
                return Err(PersistError::InvalidArgument(format!(
                    "an entity '{}' with identifier '{}' is already managed",
                    T::entity_name(),
                    identifier
                )));
            }
        }

        self.emit(LifecycleEvent::PrePersist, || {
            EntityEvent::new(LifecycleEvent::PrePersist, T::entity_name()).with_payload(row.clone())
        })
        .await?;

        let identifier = gateway.insert(self.backend(), &row).await?;

        let managed = Managed::new(entity);
        let snapshot = {
            let mut guard = managed.lock();
            gateway.apply_generated_identifier(&mut guard, &identifier);
            gateway.load_row(&guard)
        };
        let registered = self.map().put(
            T::entity_name(),
            identifier.clone(),
            managed.as_any(),
            managed.handle_id(),
            snapshot.clone(),
        )?;
        if !registered {
            return Err(PersistError::InvalidArgument(format!(
                "an entity '{}' with identifier '{}' is already managed",
                T::entity_name(),
                identifier
            )));
        }

        self.emit(LifecycleEvent::PostPersist, || {
            EntityEvent::new(LifecycleEvent::PostPersist, T::entity_name())
                .with_record_id(identifier.hash_key())
                .with_payload(snapshot)
        })
        .await?;

        Ok(managed)
    }

    /// Fetch a single entity by identifier
    ///
    /// An identity-map hit returns the registered instance without touching
    /// the backend.
    pub async fn retrieve<T: EntityMapping>(
        &self,
        id: impl Into<KeyInput>,
    ) -> Result<Managed<T>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let identifier = gateway.primary_key(id.into())?;

        if let Some(existing) = self.managed_for::<T>(&identifier)? {
            tracing::trace!(entity = T::entity_name(), id = %identifier, "identity map hit");
            return Ok(existing);
        }

        let statement = gateway.key_query(&identifier).build();
        let mut rows = self
            .backend()
            .fetch(statement)
            .await
            .map_err(PersistError::Backend)?;
        if rows.len() > 1 {
            return Err(PersistError::NonUniqueResult(format!(
                "{} rows for {} '{}'",
                rows.len(),
                T::entity_name(),
                identifier
            )));
        }
        let Some(row) = rows.pop() else {
            return Err(PersistError::NoResult(format!(
                "{} '{}'",
                T::entity_name(),
                identifier
            )));
        };
        self.load_entity(&gateway, row)
    }

    /// Write the in-memory changes of a managed entity back to its row
    ///
    /// The entity must have been loaded or created through this persister;
    /// the diff runs against the identity map's snapshot. An empty change
    /// set performs no write and fires no events.
    pub async fn update<T: EntityMapping>(&self, entity: &Managed<T>) -> Result<(), PersistError> {
        let gateway = self.gateway::<T>()?;
        let handle = entity.handle_id();

        let (original, identifier) = {
            let map = self.map();
            if !map.has(handle) {
                return Err(PersistError::NotManaged(T::entity_name().to_string()));
            }
            let original = map
                .original(handle)
                .cloned()
                .ok_or_else(|| PersistError::NotManaged(T::entity_name().to_string()))?;
            let identifier = map
                .primary_key(handle)
                .cloned()
                .ok_or_else(|| PersistError::NotManaged(T::entity_name().to_string()))?;
            (original, identifier)
        };

        let current = {
            let guard = entity.lock();
            gateway.load_row(&guard)
        };
        let changes = gateway.change_set(&original, &current);
        if changes.is_empty() {
            tracing::trace!(entity = T::entity_name(), id = %identifier, "empty change set, skipping write");
            return Ok(());
        }

        self.emit(LifecycleEvent::PreUpdate, || {
            EntityEvent::new(LifecycleEvent::PreUpdate, T::entity_name())
                .with_record_id(identifier.hash_key())
                .with_payload(current.clone())
                .with_original(original)
        })
        .await?;

        let affected = gateway.update(self.backend(), &changes, &identifier).await?;

        self.map().commit(handle, current)?;

        self.emit(LifecycleEvent::PostUpdate, || {
            EntityEvent::new(LifecycleEvent::PostUpdate, T::entity_name())
                .with_record_id(identifier.hash_key())
                .with_payload(changes)
        })
        .await?;

        // The statement has already executed, so a write anomaly surfaces
        // only after the snapshot commit and the post event.
        match affected {
            0 => Err(PersistError::NoResult(format!(
                "update of {} '{}' affected no rows",
                T::entity_name(),
                identifier
            ))),
            1 => Ok(()),
            n => Err(PersistError::NonUniqueResult(format!(
                "update of {} '{}' affected {} rows",
                T::entity_name(),
                identifier,
                n
            ))),
        }
    }

    /// Delete a managed entity's row and stop managing it
    pub async fn delete<T: EntityMapping>(&self, entity: &Managed<T>) -> Result<(), PersistError> {
        let gateway = self.gateway::<T>()?;
        let handle = entity.handle_id();

        let identifier = {
            let map = self.map();
            if !map.has(handle) {
                return Err(PersistError::NotManaged(T::entity_name().to_string()));
            }
            map.primary_key(handle)
                .cloned()
                .ok_or_else(|| PersistError::NotManaged(T::entity_name().to_string()))?
        };
        let current = {
            let guard = entity.lock();
            gateway.load_row(&guard)
        };

        self.emit(LifecycleEvent::PreRemove, || {
            EntityEvent::new(LifecycleEvent::PreRemove, T::entity_name())
                .with_record_id(identifier.hash_key())
                .with_payload(current.clone())
        })
        .await?;

        let affected = gateway.delete(self.backend(), &identifier).await?;

        self.map().remove(handle);

        self.emit(LifecycleEvent::PostRemove, || {
            EntityEvent::new(LifecycleEvent::PostRemove, T::entity_name())
                .with_record_id(identifier.hash_key())
                .with_payload(current)
        })
        .await?;

        match affected {
            0 => Err(PersistError::NoResult(format!(
                "delete of {} '{}' affected no rows",
                T::entity_name(),
                identifier
            ))),
            1 => Ok(()),
            n => Err(PersistError::NonUniqueResult(format!(
                "delete of {} '{}' affected {} rows",
                T::entity_name(),
                identifier,
                n
            ))),
        }
    }

    /// Fetch every entity matching the expressions
    pub async fn fetch_all<T: EntityMapping>(
        &self,
        expressions: &[RqlExpr],
    ) -> Result<Vec<Managed<T>>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let (query, _page) = gateway.translate(expressions, gateway.select_query())?;
        let rows = self
            .backend()
            .fetch(query.build())
            .await
            .map_err(PersistError::Backend)?;
        rows.into_iter()
            .map(|row| self.load_entity(&gateway, row))
            .collect()
    }

    /// Fetch exactly one entity matching the expressions
    pub async fn fetch_one<T: EntityMapping>(
        &self,
        expressions: &[RqlExpr],
    ) -> Result<Managed<T>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let (query, _page) = gateway.translate(expressions, gateway.select_query())?;
        let mut rows = self
            .backend()
            .fetch(query.build())
            .await
            .map_err(PersistError::Backend)?;
        if rows.len() > 1 {
            return Err(PersistError::NonUniqueResult(format!(
                "{} rows matched a single-{} fetch",
                rows.len(),
                T::entity_name()
            )));
        }
        let Some(row) = rows.pop() else {
            return Err(PersistError::NoResult(format!(
                "no {} matched the expressions",
                T::entity_name()
            )));
        };
        self.load_entity(&gateway, row)
    }

    /// Translate the expressions and wrap them in a deferred paginator
    ///
    /// No backend call happens until the paginator materializes a page.
    pub fn fetch_page<T: EntityMapping>(
        &self,
        expressions: &[RqlExpr],
    ) -> Result<Paginator<T>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let (query, page) = gateway.translate(expressions, gateway.select_query())?;
        Ok(Paginator::new(self.clone(), query, page))
    }

    /// Fetch (id, label) pairs without materializing entities
    ///
    /// Builds a two-column projection; both fields must be mapped.
    pub async fn fetch_pairs<T: EntityMapping>(
        &self,
        id_field: &str,
        label_field: &str,
        expressions: &[RqlExpr],
    ) -> Result<Vec<(Value, Value)>, PersistError> {
        let gateway = self.gateway::<T>()?;
        let id_column = gateway.column_for(id_field).ok_or_else(|| {
            PersistError::InvalidArgument(format!(
                "unknown field '{}' for entity '{}'",
                id_field,
                T::entity_name()
            ))
        })?;
        let label_column = gateway.column_for(label_field).ok_or_else(|| {
            PersistError::InvalidArgument(format!(
                "unknown field '{}' for entity '{}'",
                label_field,
                T::entity_name()
            ))
        })?;

        let base = gateway
            .select_query()
            .columns(vec![id_column.to_string(), label_column.to_string()]);
        let (query, _page) = gateway.translate(expressions, base)?;
        let rows = self
            .backend()
            .fetch(query.build())
            .await
            .map_err(PersistError::Backend)?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                (
                    row.remove(id_column).unwrap_or(Value::Null),
                    row.remove(label_column).unwrap_or(Value::Null),
                )
            })
            .collect())
    }

    /// Shared row-to-entity path used by retrieve and the fetches
    ///
    /// Registers a blank instance in the identity map before populating its
    /// fields, so a recursive load of the same identifier (triggered while
    /// resolving associations) finds the half-populated object instead of
    /// looping. The snapshot is re-captured after population because the
    /// instance was empty at registration time.
    pub(crate) fn load_entity<T: EntityMapping>(
        &self,
        gateway: &Table<T>,
        row: Row,
    ) -> Result<Managed<T>, PersistError> {
        let identifier = gateway.primary_key_of_row(&row)?;
        if let Some(existing) = self.managed_for::<T>(&identifier)? {
            return Ok(existing);
        }

        let managed = Managed::new(T::default());
        let registered = self.map().put(
            T::entity_name(),
            identifier.clone(),
            managed.as_any(),
            managed.handle_id(),
            Snapshot::new(),
        )?;
        if !registered {
            // Lost a race against a recursive registration of the same row.
            return self.managed_for::<T>(&identifier)?.ok_or_else(|| {
                PersistError::Configuration(format!(
                    "identity map entry for '{}' disappeared during load",
                    identifier
                ))
            });
        }

        let snapshot = {
            let mut guard = managed.lock();
            gateway.load_entity(&mut guard, &row);
            gateway.load_row(&guard)
        };
        self.map().commit(managed.handle_id(), snapshot)?;

        Ok(managed)
    }
}
