//! Identity map: one in-memory instance per persisted identifier
//!
//! The map is scoped to a single unit of work. It registers managed entity
//! handles under their (root entity name, identifier) pair and keeps a
//! snapshot of the column values captured at load or insert time, which is
//! what makes change-set computation a pure in-memory diff.

use crate::backend::Row;
use crate::errors::PersistError;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Column-keyed copy of an entity's last known persisted state
pub type Snapshot = Row;

/// Opaque object-identity handle, derived from the allocation address of a
/// managed entity. Used purely as a map key, never as a domain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

/// Ordered identifier: field name to scalar value pairs in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pairs: Vec<(String, Value)>,
}

impl Identifier {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self { pairs }
    }

    pub fn push(&mut self, field: impl Into<String>, value: Value) {
        self.pairs.push((field.into(), value));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.iter().map(|(_, value)| value)
    }

    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Map-key form: identifier values stringified and joined with a
    /// separator. Composite identifiers whose differing values stringify
    /// identically collide; see the crate documentation.
    pub fn hash_key(&self) -> String {
        self.pairs
            .iter()
            .map(|(_, value)| scalar_text(value))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash_key())
    }
}

/// Stringified form of a scalar value, without JSON quoting for strings
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Shared handle to a managed entity instance
///
/// Cloning the handle shares the same underlying instance; this is what
/// gives "one in-memory object per identifier" its meaning for callers.
#[derive(Debug)]
pub struct Managed<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Managed<T> {
    pub fn new(entity: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(entity)),
        }
    }

    pub(crate) fn from_arc(inner: Arc<Mutex<T>>) -> Self {
        Self { inner }
    }

    /// Lock the entity for reading or in-place mutation
    ///
    /// A poisoned lock is recovered rather than propagated; the map is
    /// scoped to one unit of work, so the entity state is still the last
    /// state written by this caller.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Object-identity handle for this instance
    pub fn handle_id(&self) -> HandleId {
        HandleId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Whether two handles refer to the same in-memory instance
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_any(&self) -> Arc<dyn Any + Send + Sync>
    where
        T: Sized,
    {
        let inner: Arc<Mutex<T>> = Arc::clone(&self.inner);
        inner
    }
}

struct MapEntry {
    object: Arc<dyn Any + Send + Sync>,
    handle: HandleId,
    identifier: Identifier,
    original: Snapshot,
}

/// Registry of managed entities for one unit of work
///
/// At most one live object per (root name, identifier). Entries are never
/// evicted implicitly; `remove` is the only way out.
pub struct IdentityMap {
    entries: HashMap<(String, String), MapEntry>,
    handles: HashMap<HandleId, (String, String)>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    /// Look up the registered object for an identifier
    pub fn get(&self, root: &str, identifier: &Identifier) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries
            .get(&(root.to_string(), identifier.hash_key()))
            .map(|entry| Arc::clone(&entry.object))
    }

    /// Register an object under its identifier
    ///
    /// Returns `false` without overwriting when an entry already exists for
    /// that root and identifier. The snapshot becomes the entry's original
    /// state.
    pub fn put(
        &mut self,
        root: &str,
        identifier: Identifier,
        object: Arc<dyn Any + Send + Sync>,
        handle: HandleId,
        original: Snapshot,
    ) -> Result<bool, PersistError> {
        if identifier.is_empty() {
            return Err(PersistError::InvalidArgument(format!(
                "cannot register '{}' entity under an empty identifier",
                root
            )));
        }

        let key = (root.to_string(), identifier.hash_key());
        if self.entries.contains_key(&key) {
            return Ok(false);
        }

        self.handles.insert(handle, key.clone());
        self.entries.insert(
            key,
            MapEntry {
                object,
                handle,
                identifier,
                original,
            },
        );
        Ok(true)
    }

    /// Membership test by object identity, not by value
    pub fn has(&self, handle: HandleId) -> bool {
        self.handles.contains_key(&handle)
    }

    /// Snapshot captured at the last load or commit for this object
    pub fn original(&self, handle: HandleId) -> Option<&Snapshot> {
        self.entry_for(handle).map(|entry| &entry.original)
    }

    /// Identifier under which this exact object instance is registered
    pub fn primary_key(&self, handle: HandleId) -> Option<&Identifier> {
        self.entry_for(handle).map(|entry| &entry.identifier)
    }

    /// Re-capture the original state from a fresh snapshot
    ///
    /// Called only after a write is known to have succeeded, so that a
    /// retry after a failed write still diffs against the pre-write state.
    pub fn commit(&mut self, handle: HandleId, snapshot: Snapshot) -> Result<(), PersistError> {
        let key = self
            .handles
            .get(&handle)
            .ok_or_else(|| PersistError::NotManaged("<unregistered handle>".to_string()))?;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.original = snapshot;
        }
        Ok(())
    }

    /// Delete an entry; returns `false` if the object was never registered
    pub fn remove(&mut self, handle: HandleId) -> bool {
        match self.handles.remove(&handle) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_for(&self, handle: HandleId) -> Option<&MapEntry> {
        let key = self.handles.get(&handle)?;
        let entry = self.entries.get(key)?;
        // A stale handle must not alias a newer entry under the same key.
        (entry.handle == handle).then_some(entry)
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ident(value: i64) -> Identifier {
        Identifier::from_pairs(vec![("id".into(), json!(value))])
    }

    fn snapshot(name: &str) -> Snapshot {
        let mut row = Snapshot::new();
        row.insert("name".into(), json!(name));
        row
    }

    fn register(
        map: &mut IdentityMap,
        entity: &Managed<String>,
        id: Identifier,
        original: Snapshot,
    ) -> Result<bool, PersistError> {
        map.put(
            "customer",
            id,
            entity.as_any(),
            entity.handle_id(),
            original,
        )
    }

    #[test]
    fn put_twice_returns_true_then_false() {
        let mut map = IdentityMap::new();
        let first = Managed::new("ada".to_string());
        let second = Managed::new("grace".to_string());

        assert!(register(&mut map, &first, ident(1), snapshot("ada")).unwrap());
        assert!(!register(&mut map, &second, ident(1), snapshot("grace")).unwrap());

        // The first registration wins and is the one returned by get.
        let stored = map.get("customer", &ident(1)).unwrap();
        let stored = stored.downcast::<Mutex<String>>().unwrap();
        assert_eq!(*stored.lock().unwrap(), "ada");
    }

    #[test]
    fn put_with_empty_identifier_is_an_error() {
        let mut map = IdentityMap::new();
        let entity = Managed::new("ada".to_string());
        let result = register(&mut map, &entity, Identifier::new(), Snapshot::new());
        assert!(matches!(result, Err(PersistError::InvalidArgument(_))));
    }

    #[test]
    fn membership_is_by_object_identity() {
        let mut map = IdentityMap::new();
        let registered = Managed::new("ada".to_string());
        let equal_but_distinct = Managed::new("ada".to_string());

        register(&mut map, &registered, ident(1), snapshot("ada")).unwrap();
        assert!(map.has(registered.handle_id()));
        assert!(map.has(registered.clone().handle_id()));
        assert!(!map.has(equal_but_distinct.handle_id()));
    }

    #[test]
    fn uniqueness_is_scoped_to_the_root_name() {
        let mut map = IdentityMap::new();
        let customer = Managed::new("ada".to_string());
        let order = Managed::new("ada".to_string());

        register(&mut map, &customer, ident(1), Snapshot::new()).unwrap();
        assert!(map
            .put(
                "order",
                ident(1),
                order.as_any(),
                order.handle_id(),
                Snapshot::new(),
            )
            .unwrap());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn commit_replaces_the_original_snapshot() {
        let mut map = IdentityMap::new();
        let entity = Managed::new("ada".to_string());
        register(&mut map, &entity, ident(1), snapshot("ada")).unwrap();

        map.commit(entity.handle_id(), snapshot("ada lovelace"))
            .unwrap();
        assert_eq!(
            map.original(entity.handle_id()).unwrap().get("name"),
            Some(&json!("ada lovelace"))
        );
    }

    #[test]
    fn commit_on_unregistered_handle_fails() {
        let mut map = IdentityMap::new();
        let entity = Managed::new("ada".to_string());
        let result = map.commit(entity.handle_id(), Snapshot::new());
        assert!(matches!(result, Err(PersistError::NotManaged(_))));
    }

    #[test]
    fn remove_reports_absence() {
        let mut map = IdentityMap::new();
        let entity = Managed::new("ada".to_string());
        register(&mut map, &entity, ident(1), Snapshot::new()).unwrap();

        assert!(map.remove(entity.handle_id()));
        assert!(!map.remove(entity.handle_id()));
        assert!(map.get("customer", &ident(1)).is_none());
    }

    #[test]
    fn primary_key_returns_the_registered_identifier() {
        let mut map = IdentityMap::new();
        let entity = Managed::new("ada".to_string());
        let id = Identifier::from_pairs(vec![
            ("role".into(), json!(1)),
            ("resource".into(), json!(2)),
        ]);
        map.put(
            "acl",
            id.clone(),
            entity.as_any(),
            entity.handle_id(),
            Snapshot::new(),
        )
        .unwrap();

        assert_eq!(map.primary_key(entity.handle_id()), Some(&id));
        assert_eq!(id.hash_key(), "1|2");
    }
}
