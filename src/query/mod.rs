//! Query construction utilities
//!
//! This module builds the backend-native statements executed by the
//! query-execution backend: a select query value with conditions, ordering,
//! and a limit window, rendered to SQL text with positional parameters.

pub mod ordering;
pub mod select;
pub mod sql;

pub use ordering::SortOrder;
pub use select::{Comparison, Condition, SelectQuery};

use serde_json::Value;

/// A rendered statement plus its positional parameters, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Pagination window derived from a `limit(start,count)` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// One-based page number
    pub number: u64,
    /// Rows per page
    pub size: u64,
}
