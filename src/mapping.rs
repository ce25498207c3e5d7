//! Entity/field metadata
//!
//! Entities are plain structs. Instead of runtime reflection, each entity
//! type publishes an explicit accessor table: one [`FieldDef`] per mapped
//! field, pairing the field name, its column name, and get/set functions.
//! The table gateway is built once per type from this metadata.

use crate::backend::Row;
use serde_json::Value;
use std::collections::HashMap;

/// One mapped field: name, column, and its accessor pair
pub struct FieldDef<T: ?Sized> {
    pub field: &'static str,
    pub column: &'static str,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, &Value),
}

impl<T> FieldDef<T> {
    pub fn new(
        field: &'static str,
        column: &'static str,
        get: fn(&T) -> Value,
        set: fn(&mut T, &Value),
    ) -> Self {
        Self {
            field,
            column,
            get,
            set,
        }
    }
}

impl<T> std::fmt::Debug for FieldDef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("field", &self.field)
            .field("column", &self.column)
            .finish()
    }
}

/// Relational metadata for an entity type
///
/// `entity_name` is the root name scoping identity-map uniqueness: entity
/// types sharing a table register under the same root so their identifiers
/// collide correctly.
pub trait EntityMapping: Default + Send + 'static {
    /// Root name under which instances register in the identity map
    fn entity_name() -> &'static str;

    /// Relational table name
    fn table_name() -> &'static str;

    /// Accessor table, in field declaration order
    fn fields() -> Vec<FieldDef<Self>>
    where
        Self: Sized;

    /// Identifier field names, in declaration order
    fn key_fields() -> &'static [&'static str];

    /// Whether the key is database-assigned (auto-increment/sequence)
    fn generated_key() -> bool {
        false
    }

    /// Populate entity fields from a fetched row
    ///
    /// The default sets every field whose column appears in the row and
    /// leaves the rest untouched. Specializations override this to populate
    /// associations, e.g. building a placeholder from a joined identifier.
    fn load_entity(&mut self, row: &Row)
    where
        Self: Sized,
    {
        for def in Self::fields() {
            if let Some(value) = row.get(def.column) {
                (def.set)(self, value);
            }
        }
    }

    /// Extract a column-keyed row from the entity, inverse of `load_entity`
    fn load_row(&self) -> Row
    where
        Self: Sized,
    {
        Self::fields()
            .iter()
            .map(|def| (def.column.to_string(), (def.get)(self)))
            .collect()
    }
}

/// Raw identifier input accepted by `Table::primary_key`
///
/// Scalar, positional, and associative forms all normalize to the canonical
/// field-named [`Identifier`](crate::identity::Identifier) in declared order.
#[derive(Debug, Clone)]
pub enum KeyInput {
    Scalar(Value),
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl From<Value> for KeyInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => KeyInput::Positional(values),
            Value::Object(map) => KeyInput::Named(map.into_iter().collect()),
            scalar => KeyInput::Scalar(scalar),
        }
    }
}

impl From<i64> for KeyInput {
    fn from(value: i64) -> Self {
        KeyInput::Scalar(Value::from(value))
    }
}

impl From<&str> for KeyInput {
    fn from(value: &str) -> Self {
        KeyInput::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for KeyInput {
    fn from(value: String) -> Self {
        KeyInput::Scalar(Value::String(value))
    }
}

impl From<Vec<Value>> for KeyInput {
    fn from(values: Vec<Value>) -> Self {
        KeyInput::Positional(values)
    }
}

impl From<Vec<i64>> for KeyInput {
    fn from(values: Vec<i64>) -> Self {
        KeyInput::Positional(values.into_iter().map(Value::from).collect())
    }
}

impl From<HashMap<String, Value>> for KeyInput {
    fn from(map: HashMap<String, Value>) -> Self {
        KeyInput::Named(map)
    }
}

impl From<crate::identity::Identifier> for KeyInput {
    fn from(identifier: crate::identity::Identifier) -> Self {
        KeyInput::Named(
            identifier
                .pairs()
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }
}
