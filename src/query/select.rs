//! Select query value type
//!
//! A `SelectQuery` accumulates projection columns, filter conditions,
//! ordering, and a limit window, and renders itself into a [`Statement`].

use crate::query::ordering::SortOrder;
use crate::query::sql::SqlGenerator;
use crate::query::Statement;
use serde_json::Value;

/// Comparison operators emitted by query translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Like,
}

/// Single condition in a WHERE clause; conditions combine with AND
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub compare: Comparison,
    pub value: Value,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            compare: Comparison::Eq,
            value,
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            compare: Comparison::Like,
            value: Value::String(pattern.into()),
        }
    }
}

/// Query value for a single-table SELECT
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) order_by: Vec<(String, SortOrder)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Replace the projection columns
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Add a filter condition (AND-combined)
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append an ordering term
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render the query into an executable statement
    pub fn build(&self) -> Statement {
        let (where_clause, params) = SqlGenerator::build_where_clause(&self.conditions);
        let order_clause = SqlGenerator::build_order_clause(&self.order_by);
        let limit_clause = SqlGenerator::build_limit_clause(self.limit, self.offset);

        let mut sql = String::with_capacity(
            16 + self.table.len()
                + self.columns.iter().map(|c| c.len() + 2).sum::<usize>()
                + where_clause.len()
                + order_clause.len()
                + limit_clause.len(),
        );
        sql.push_str("SELECT ");
        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        if !order_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&order_clause);
        }
        if !limit_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&limit_clause);
        }

        Statement::new(sql, params)
    }
}
