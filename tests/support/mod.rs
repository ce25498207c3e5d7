//! Shared test fixtures: an in-memory mock backend and two entity mappings.

#![allow(dead_code)]

use rowstead::prelude::*;
use rowstead::Statement;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted query backend that records every statement it executes.
///
/// Fetch results, generated-key rows, and affected counts are queued ahead
/// of time; an unscripted fetch returns no rows, an unscripted execute
/// reports one affected row.
#[derive(Default)]
pub struct MockBackend {
    fetch_results: Mutex<VecDeque<Vec<Row>>>,
    insert_results: Mutex<VecDeque<Row>>,
    execute_results: Mutex<VecDeque<u64>>,
    statements: Mutex<Vec<Statement>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.fetch_results.lock().unwrap().push_back(rows);
    }

    pub fn queue_generated_keys(&self, row: Row) {
        self.insert_results.lock().unwrap().push_back(row);
    }

    pub fn queue_affected(&self, affected: u64) {
        self.execute_results.lock().unwrap().push_back(affected);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn last_statement(&self) -> Option<Statement> {
        self.statements.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn fetch(&self, statement: Statement) -> anyhow::Result<Vec<Row>> {
        self.statements.lock().unwrap().push(statement);
        Ok(self
            .fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(&self, statement: Statement) -> anyhow::Result<u64> {
        self.statements.lock().unwrap().push(statement);
        Ok(self.execute_results.lock().unwrap().pop_front().unwrap_or(1))
    }

    async fn insert(&self, statement: Statement) -> anyhow::Result<Row> {
        self.statements.lock().unwrap().push(statement);
        Ok(self
            .insert_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

/// Single-field, database-generated key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub status: String,
}

impl EntityMapping for Customer {
    fn entity_name() -> &'static str {
        "customer"
    }

    fn table_name() -> &'static str {
        "customers"
    }

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new(
                "id",
                "cust_id",
                |e| json!(e.id),
                |e, v| {
                    if let Some(id) = v.as_i64() {
                        e.id = id;
                    }
                },
            ),
            FieldDef::new(
                "name",
                "name",
                |e| json!(e.name),
                |e, v| {
                    if let Some(text) = v.as_str() {
                        e.name = text.to_string();
                    }
                },
            ),
            FieldDef::new(
                "email",
                "email",
                |e| e.email.clone().map(Value::String).unwrap_or(Value::Null),
                |e, v| e.email = v.as_str().map(str::to_string),
            ),
            FieldDef::new(
                "status",
                "status",
                |e| json!(e.status),
                |e, v| {
                    if let Some(text) = v.as_str() {
                        e.status = text.to_string();
                    }
                },
            ),
        ]
    }

    fn key_fields() -> &'static [&'static str] {
        &["id"]
    }

    fn generated_key() -> bool {
        true
    }
}

/// Composite, application-assigned key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AclRule {
    pub role: i64,
    pub resource: i64,
    pub allowed: bool,
}

impl EntityMapping for AclRule {
    fn entity_name() -> &'static str {
        "acl_rule"
    }

    fn table_name() -> &'static str {
        "acl_rules"
    }

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new(
                "role",
                "role_id",
                |e| json!(e.role),
                |e, v| {
                    if let Some(id) = v.as_i64() {
                        e.role = id;
                    }
                },
            ),
            FieldDef::new(
                "resource",
                "resource_id",
                |e| json!(e.resource),
                |e, v| {
                    if let Some(id) = v.as_i64() {
                        e.resource = id;
                    }
                },
            ),
            FieldDef::new(
                "allowed",
                "allowed",
                |e| json!(e.allowed),
                |e, v| {
                    if let Some(flag) = v.as_bool() {
                        e.allowed = flag;
                    }
                },
            ),
        ]
    }

    fn key_fields() -> &'static [&'static str] {
        &["role", "resource"]
    }
}

pub fn customer_row(id: i64, name: &str, status: &str) -> Row {
    let mut row = Row::new();
    row.insert("cust_id".into(), json!(id));
    row.insert("name".into(), json!(name));
    row.insert("email".into(), Value::Null);
    row.insert("status".into(), json!(status));
    row
}

/// Subscribe a recording listener to all six lifecycle kinds.
pub fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<&'static str>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        LifecycleEvent::PrePersist,
        LifecycleEvent::PostPersist,
        LifecycleEvent::PreUpdate,
        LifecycleEvent::PostUpdate,
        LifecycleEvent::PreRemove,
        LifecycleEvent::PostRemove,
    ] {
        let log = log.clone();
        bus.subscribe(kind, move |event| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(event.kind.as_str());
                Ok(())
            }
        });
    }
    log
}
