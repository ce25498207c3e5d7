//! Convenience re-exports for common rowstead usage
//!
//! ```rust
//! use rowstead::prelude::*;
//! ```

pub use crate::backend::{QueryBackend, Row};
pub use crate::errors::PersistError;
pub use crate::gateway::Table;
pub use crate::identity::{Identifier, IdentityMap, Managed, Snapshot};
pub use crate::mapping::{EntityMapping, FieldDef, KeyInput};
pub use crate::paginator::Paginator;
pub use crate::persister::{Persister, PersisterBuilder};
pub use crate::query::{Page, SelectQuery, SortOrder, Statement};
pub use crate::rql::RqlExpr;

pub use event_system::prelude::*;

pub use async_trait::async_trait;
pub use serde_json::Value;
