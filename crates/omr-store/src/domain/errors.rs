//! Domain errors for the persistent store.

pub use shared_types::StorageError;
