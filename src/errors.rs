//! Error types for the rowstead crate
//!
//! This module contains all error types that can be returned by persistence
//! operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    /// Zero rows where exactly one (or more) was required
    #[error("no result found: {0}")]
    NoResult(String),

    /// More than one row where at most one was required
    #[error("non-unique result: {0}")]
    NonUniqueResult(String),

    /// Malformed identifier or wrong value passed across a boundary
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unrecognized operator in a query expression
    #[error("unimplemented query operator: {0}")]
    UnsupportedOperator(String),

    /// Disallowed query construct, e.g. parenthesis-grouped expressions
    #[error("unsupported query syntax: {0}")]
    UnsupportedSyntax(String),

    /// Update or delete attempted on an entity absent from the identity map
    #[error("entity of type '{0}' is not managed by this persister")]
    NotManaged(String),

    /// Missing gateway registration or broken field/column mapping
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the query-execution backend
    #[error("backend error: {0}")]
    Backend(#[source] anyhow::Error),

    /// A lifecycle listener rejected the operation
    #[error("event listener failed: {0}")]
    Listener(#[source] anyhow::Error),
}
