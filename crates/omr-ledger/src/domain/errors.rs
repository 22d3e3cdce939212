//! Domain errors for the hash-chained ledger.

pub use shared_types::ChainError;
