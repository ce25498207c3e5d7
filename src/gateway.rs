//! Table gateway: the per-entity-type bridge between rows and objects
//!
//! A [`Table`] is built once per entity type from its accessor table. It
//! owns the field/column mapping and everything derived from it: RQL
//! translation, row/object conversion, change-set computation, identifier
//! normalization, and the insert/update/delete statements.

use crate::backend::{QueryBackend, Row};
use crate::errors::PersistError;
use crate::identity::{scalar_text, Identifier, Snapshot};
use crate::mapping::{EntityMapping, FieldDef, KeyInput};
use crate::query::{Condition, Page, SelectQuery, SortOrder, Statement};
use crate::query::sql::SqlGenerator;
use crate::rql::{parse_call, RqlExpr};
use serde_json::Value;
use std::collections::HashMap;

/// Gateway instance for one entity type
pub struct Table<T: EntityMapping> {
    fields: Vec<FieldDef<T>>,
    field_to_column: HashMap<&'static str, &'static str>,
    column_to_field: HashMap<&'static str, &'static str>,
    key_fields: Vec<&'static str>,
    key_columns: Vec<&'static str>,
}

impl<T: EntityMapping> Table<T> {
    /// Build the gateway, validating the field/column mapping
    ///
    /// Every column must have exactly one field counterpart and vice versa;
    /// a duplicate on either side is a configuration error. All key fields
    /// must be mapped.
    pub fn new() -> Result<Self, PersistError> {
        let fields = T::fields();
        let mut field_to_column = HashMap::with_capacity(fields.len());
        let mut column_to_field = HashMap::with_capacity(fields.len());

        for def in &fields {
            if field_to_column.insert(def.field, def.column).is_some() {
                return Err(PersistError::Configuration(format!(
                    "entity '{}' maps field '{}' more than once",
                    T::entity_name(),
                    def.field
                )));
            }
            if column_to_field.insert(def.column, def.field).is_some() {
                return Err(PersistError::Configuration(format!(
                    "entity '{}' maps column '{}' more than once",
                    T::entity_name(),
                    def.column
                )));
            }
        }

        let key_fields: Vec<&'static str> = T::key_fields().to_vec();
        if key_fields.is_empty() {
            return Err(PersistError::Configuration(format!(
                "entity '{}' declares no key fields",
                T::entity_name()
            )));
        }
        let mut key_columns = Vec::with_capacity(key_fields.len());
        for field in &key_fields {
            match field_to_column.get(field) {
                Some(column) => key_columns.push(*column),
                None => {
                    return Err(PersistError::Configuration(format!(
                        "entity '{}' key field '{}' has no column mapping",
                        T::entity_name(),
                        field
                    )))
                }
            }
        }

        Ok(Self {
            fields,
            field_to_column,
            column_to_field,
            key_fields,
            key_columns,
        })
    }

    /// Column mapped to a field name, if any
    pub fn column_for(&self, field: &str) -> Option<&'static str> {
        self.field_to_column.get(field).copied()
    }

    /// Base SELECT over every mapped column
    pub fn select_query(&self) -> SelectQuery {
        SelectQuery::new(
            T::table_name(),
            self.fields.iter().map(|def| def.column.to_string()).collect(),
        )
    }

    /// Translate RQL expressions onto a query
    ///
    /// Operator entries handle `sort(...)` and `limit(start,count)`; any
    /// other operator is fatal. Comparison entries on known fields become
    /// equality or LIKE predicates (AND-combined); unknown filter fields
    /// are dropped silently, a deliberate leniency toward stale client
    /// query strings. Keys opening a parenthesis group are rejected.
    pub fn translate(
        &self,
        expressions: &[RqlExpr],
        mut query: SelectQuery,
    ) -> Result<(SelectQuery, Option<Page>), PersistError> {
        let mut page = None;

        for expression in expressions {
            match expression {
                RqlExpr::Operator(text) => match parse_call(text) {
                    Some(("sort", args)) => {
                        for operand in args.split(',') {
                            // An operand needs a direction prefix plus at
                            // least one name character.
                            if operand.len() < 2 {
                                continue;
                            }
                            let order = if operand.starts_with('-') {
                                SortOrder::Desc
                            } else {
                                SortOrder::Asc
                            };
                            let field = operand.trim_start_matches(['+', '-']);
                            if let Some(column) = self.column_for(field) {
                                query = query.order_by(column, order);
                            }
                        }
                    }
                    Some(("limit", args)) => {
                        let (start, count) = parse_limit_args(text, args)?;
                        page = Some(Page {
                            number: start / count + 1,
                            size: count,
                        });
                        query = query.limit(count).offset(start);
                    }
                    _ => return Err(PersistError::UnsupportedOperator(text.clone())),
                },
                RqlExpr::Comparison { field, value } => {
                    if field.starts_with('(') {
                        return Err(PersistError::UnsupportedSyntax(format!(
                            "parenthesis-grouped expression '{}={}'; use function-call syntax",
                            field, value
                        )));
                    }
                    if let Some(column) = self.column_for(field) {
                        query = if value.contains('*') {
                            query.filter(Condition::like(column, value.replace('*', "%")))
                        } else {
                            query.filter(Condition::eq(column, Value::String(value.clone())))
                        };
                    }
                }
            }
        }

        Ok((query, page))
    }

    /// Populate an entity from a fetched row
    pub fn load_entity(&self, entity: &mut T, row: &Row) {
        entity.load_entity(row);
    }

    /// Extract a column-keyed row from an entity
    pub fn load_row(&self, entity: &T) -> Row {
        entity.load_row()
    }

    /// Columns whose current value differs from the original snapshot
    ///
    /// Comparison is loose: null only ever equals null, and otherwise
    /// values that stringify identically count as equal, so a numeric
    /// column round-tripped through text does not show up as changed.
    pub fn change_set(&self, original: &Snapshot, current: &Row) -> Row {
        let mut changes = Row::new();
        for def in &self.fields {
            let old = original.get(def.column);
            let new = current.get(def.column);
            let differs = match (old, new) {
                (Some(old), Some(new)) => !loosely_equal(old, new),
                (None, Some(new)) => !new.is_null(),
                (Some(old), None) => !old.is_null(),
                (None, None) => false,
            };
            if differs {
                changes.insert(
                    def.column.to_string(),
                    new.cloned().unwrap_or(Value::Null),
                );
            }
        }
        changes
    }

    /// Normalize raw identifier input to the canonical field-named form
    ///
    /// Accepts a scalar (single-field keys only), a positional array in
    /// declared-field order, or an associative map keyed by field or column
    /// names.
    pub fn primary_key(&self, raw: KeyInput) -> Result<Identifier, PersistError> {
        match raw {
            KeyInput::Scalar(value) => {
                if self.key_fields.len() != 1 {
                    return Err(PersistError::InvalidArgument(format!(
                        "entity '{}' has a composite key of {} fields; a scalar identifier is ambiguous",
                        T::entity_name(),
                        self.key_fields.len()
                    )));
                }
                Ok(Identifier::from_pairs(vec![(
                    self.key_fields[0].to_string(),
                    value,
                )]))
            }
            KeyInput::Positional(values) => {
                if values.len() != self.key_fields.len() {
                    return Err(PersistError::InvalidArgument(format!(
                        "entity '{}' expects {} identifier values, got {}",
                        T::entity_name(),
                        self.key_fields.len(),
                        values.len()
                    )));
                }
                Ok(Identifier::from_pairs(
                    self.key_fields
                        .iter()
                        .map(|field| field.to_string())
                        .zip(values)
                        .collect(),
                ))
            }
            KeyInput::Named(map) => {
                let mut pairs = Vec::with_capacity(self.key_fields.len());
                for (field, column) in self.key_fields.iter().zip(&self.key_columns) {
                    let value = map
                        .get(*field)
                        .or_else(|| map.get(*column))
                        .ok_or_else(|| {
                            PersistError::InvalidArgument(format!(
                                "identifier for entity '{}' is missing key field '{}'",
                                T::entity_name(),
                                field
                            ))
                        })?;
                    pairs.push((field.to_string(), value.clone()));
                }
                Ok(Identifier::from_pairs(pairs))
            }
        }
    }

    /// Extract the identifier from a fetched row
    pub fn primary_key_of_row(&self, row: &Row) -> Result<Identifier, PersistError> {
        let mut pairs = Vec::with_capacity(self.key_fields.len());
        for (field, column) in self.key_fields.iter().zip(&self.key_columns) {
            let value = row.get(*column).ok_or_else(|| {
                PersistError::InvalidArgument(format!(
                    "row for entity '{}' is missing key column '{}'",
                    T::entity_name(),
                    column
                ))
            })?;
            pairs.push((field.to_string(), value.clone()));
        }
        Ok(Identifier::from_pairs(pairs))
    }

    /// Narrow a query down to one identifier
    pub fn key_query(&self, identifier: &Identifier) -> SelectQuery {
        let mut query = self.select_query();
        for (field, value) in identifier.pairs() {
            if let Some(column) = self.column_for(field) {
                query = query.filter(Condition::eq(column, value.clone()));
            }
        }
        query
    }

    /// Execute an INSERT and return the normalized identifier
    ///
    /// For database-assigned keys the key columns are left out of the
    /// statement and read back from the backend; otherwise the identifier
    /// comes from the row itself.
    pub async fn insert(
        &self,
        backend: &dyn QueryBackend,
        row: &Row,
    ) -> Result<Identifier, PersistError> {
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for def in &self.fields {
            if T::generated_key() && self.key_columns.contains(&def.column) {
                continue;
            }
            if let Some(value) = row.get(def.column) {
                columns.push(def.column);
                params.push(value.clone());
            }
        }

        let placeholders: Vec<String> =
            (1..=params.len()).map(|index| format!("${}", index)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::table_name(),
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(table = T::table_name(), sql = %sql, "executing insert");

        let generated = backend
            .insert(Statement::new(sql, params))
            .await
            .map_err(PersistError::Backend)?;

        if T::generated_key() {
            let mut pairs = Vec::with_capacity(self.key_fields.len());
            for (field, column) in self.key_fields.iter().zip(&self.key_columns) {
                let value = generated.get(*column).or_else(|| generated.get(*field)).ok_or_else(|| {
                    PersistError::Backend(anyhow::anyhow!(
                        "backend returned no generated value for key column '{}'",
                        column
                    ))
                })?;
                pairs.push((field.to_string(), value.clone()));
            }
            Ok(Identifier::from_pairs(pairs))
        } else {
            self.primary_key_of_row(row)
        }
    }

    /// Execute an UPDATE for a change set, keyed by identifier
    pub async fn update(
        &self,
        backend: &dyn QueryBackend,
        changes: &Row,
        identifier: &Identifier,
    ) -> Result<u64, PersistError> {
        let mut assignments = Vec::with_capacity(changes.len());
        let mut params = Vec::with_capacity(changes.len() + identifier.len());
        // Deterministic column order for the SET clause.
        for def in &self.fields {
            if let Some(value) = changes.get(def.column) {
                params.push(value.clone());
                assignments.push(format!("{} = ${}", def.column, params.len()));
            }
        }

        let predicate = SqlGenerator::build_key_predicate(&self.key_columns, params.len() + 1);
        params.extend(identifier.values().cloned());

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            T::table_name(),
            assignments.join(", "),
            predicate
        );
        tracing::debug!(table = T::table_name(), sql = %sql, "executing update");

        backend
            .execute(Statement::new(sql, params))
            .await
            .map_err(PersistError::Backend)
    }

    /// Execute a DELETE, keyed by identifier
    pub async fn delete(
        &self,
        backend: &dyn QueryBackend,
        identifier: &Identifier,
    ) -> Result<u64, PersistError> {
        let predicate = SqlGenerator::build_key_predicate(&self.key_columns, 1);
        let params: Vec<Value> = identifier.values().cloned().collect();

        let sql = format!("DELETE FROM {} WHERE {}", T::table_name(), predicate);
        tracing::debug!(table = T::table_name(), sql = %sql, "executing delete");

        backend
            .execute(Statement::new(sql, params))
            .await
            .map_err(PersistError::Backend)
    }

    /// Write a database-generated identifier back onto the entity
    ///
    /// No-op for application-assigned keys, which are already set before
    /// insert.
    pub fn apply_generated_identifier(&self, entity: &mut T, identifier: &Identifier) {
        if !T::generated_key() {
            return;
        }
        for def in &self.fields {
            if let Some(value) = identifier.get(def.field) {
                (def.set)(entity, value);
            }
        }
    }
}

impl<T: EntityMapping> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("entity", &T::entity_name())
            .field("table", &T::table_name())
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Loose value comparison for change detection
///
/// Null never equals a non-null value. Values of differing JSON types that
/// stringify identically count as equal.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ if a == b => true,
        _ => scalar_text(a) == scalar_text(b),
    }
}

fn parse_limit_args(text: &str, args: &str) -> Result<(u64, u64), PersistError> {
    let mut parts = args.split(',');
    let start = parts.next().map(str::trim).unwrap_or("");
    let count = parts.next().map(str::trim).unwrap_or("");
    if parts.next().is_some() {
        return Err(PersistError::InvalidArgument(format!(
            "limit operator takes exactly two operands: '{}'",
            text
        )));
    }
    let start: u64 = start.parse().map_err(|_| {
        PersistError::InvalidArgument(format!("limit start is not a number: '{}'", text))
    })?;
    let count: u64 = count.parse().map_err(|_| {
        PersistError::InvalidArgument(format!("limit count is not a number: '{}'", text))
    })?;
    if count == 0 {
        return Err(PersistError::InvalidArgument(format!(
            "limit count must be positive: '{}'",
            text
        )));
    }
    Ok((start, count))
}
