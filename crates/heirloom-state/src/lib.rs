//! heirloom-state — embedded ledger store for Heirloom.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for applications, environments, regions, and deployment records.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Deployment keys are composed as `{application}:{environment}:{region}:{id}`
//! (fixed-width hex) so one triple's history is a single prefix range.
//!
//! The ledger talks to storage through three traits:
//!
//! - [`LedgerStore`] opens read or write transactions and runs a closure in them
//! - [`LedgerView`] covers natural-key lookups and ordered queries
//! - [`LedgerTxn`] adds upserts, inserts, updates, and delete-by-predicate
//!
//! [`RedbStore`] is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod backend;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::{LedgerStore, LedgerTxn, LedgerView};
pub use error::{StateError, StateResult};
pub use store::RedbStore;
pub use types::*;
