//! Query-execution backend interface
//!
//! The persistence engine never talks to a SQL driver directly. It builds
//! [`Statement`]s and hands them to an implementation of [`QueryBackend`],
//! which executes them and returns rows as column-keyed value maps.

use crate::query::Statement;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A fetched row: column name to value
pub type Row = HashMap<String, Value>;

/// Opaque query-execution collaborator
///
/// Implementations wrap a concrete driver or an in-memory store. Errors are
/// reported as `anyhow::Error` and surface to callers as
/// [`PersistError::Backend`](crate::PersistError::Backend).
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a SELECT and return all matching rows
    async fn fetch(&self, statement: Statement) -> anyhow::Result<Vec<Row>>;

    /// Execute a write statement and return the affected-row count
    async fn execute(&self, statement: Statement) -> anyhow::Result<u64>;

    /// Execute an INSERT and return any database-generated key columns
    ///
    /// The returned row may be empty when the table's key is
    /// application-assigned.
    async fn insert(&self, statement: Statement) -> anyhow::Result<Row>;
}
