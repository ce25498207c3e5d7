//! # rowstead
//!
//! A lightweight identity-map persistence engine: plain domain structs are
//! mapped to relational rows through per-type table gateways, in-memory
//! mutations are diffed against load-time snapshots to produce minimal
//! UPDATE statements, a flat RQL-like filter/sort/paging language is
//! translated to SQL, and lifecycle events fire around create, update, and
//! delete.
//!
//! One persister plus one identity map serve a single unit of work; the
//! identity map guarantees a single in-memory instance per persisted
//! identifier for that scope.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowstead::prelude::*;
//! use serde_json::{json, Value};
//!
//! #[derive(Debug, Default)]
//! struct Customer {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl EntityMapping for Customer {
//!     fn entity_name() -> &'static str { "customer" }
//!     fn table_name() -> &'static str { "customers" }
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::new("id", "cust_id",
//!                 |c| json!(c.id),
//!                 |c, v| if let Some(id) = v.as_i64() { c.id = id }),
//!             FieldDef::new("name", "name",
//!                 |c| json!(c.name),
//!                 |c, v| if let Some(s) = v.as_str() { c.name = s.into() }),
//!         ]
//!     }
//!     fn key_fields() -> &'static [&'static str] { &["id"] }
//!     fn generated_key() -> bool { true }
//! }
//!
//! # async fn run(backend: std::sync::Arc<dyn QueryBackend>) -> Result<(), PersistError> {
//! let persister = Persister::builder(backend)
//!     .register::<Customer>()
//!     .build();
//!
//! let customer = persister.retrieve::<Customer>(42).await?;
//! customer.lock().name = "Ada".to_string();
//! persister.update(&customer).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Known limitation
//!
//! Identifier map keys are the ordered concatenation of the identifier's
//! stringified values. Composite identifiers whose differing value
//! combinations stringify identically collide in the map.

pub mod backend;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod mapping;
pub mod paginator;
pub mod persister;
pub mod prelude;
pub mod query;
pub mod rql;

pub use backend::{QueryBackend, Row};
pub use errors::PersistError;
pub use gateway::Table;
pub use identity::{HandleId, Identifier, IdentityMap, Managed, Snapshot};
pub use mapping::{EntityMapping, FieldDef, KeyInput};
pub use paginator::Paginator;
pub use persister::{Persister, PersisterBuilder};
pub use query::{Comparison, Condition, Page, SelectQuery, SortOrder, Statement};
pub use rql::RqlExpr;

// Re-export the event member crate so listeners can be written against the
// same versions of its types.
pub use event_system;
pub use event_system::{EntityEvent, EventBus, LifecycleEvent};

// Re-export external dependencies used in the public API
pub use anyhow;
pub use async_trait;
pub use serde_json;
