//! # Persistent Store (C2)
//!
//! Transactional entity storage for the OMR evaluation pipeline, paired
//! with the [`omr_ledger`] ledger via a write-ahead journal: record
//! intent, mutate entity state, append to the ledger, clear the intent.
//! A crash between mutation and append is detected at startup by
//! replaying [`PendingTransition`] entries left in the journal.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain` - the journal's `PendingTransition` record and
//!   [`StorageError`], re-exported from `shared-types`.
//! - `ports::inbound` - the [`Store`] trait other components depend on.
//! - `adapters::memory` - an in-memory store for tests.
//! - `adapters::sqlite` - a durable `sqlx`/SQLite store.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::memory::InMemoryStore;
pub use adapters::sqlite::SqliteStore;
pub use domain::errors::StorageError;
pub use domain::journal::PendingTransition;
pub use ports::inbound::{SheetBundle, Store};
