//! Unit-of-work persister
//!
//! The persister orchestrates create/retrieve/update/delete/fetch across
//! table gateways, consults the identity map to guarantee one in-memory
//! instance per identifier, computes change sets before writing, and fires
//! lifecycle events around every destructive step.

mod core;
mod operations;

pub use self::core::{Persister, PersisterBuilder};
