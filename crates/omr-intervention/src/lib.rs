//! # Intervention Queue (C5)
//!
//! A priority-ordered work queue of items requiring human attention.
//! Lifecycle: `open → claimed → resolved`, with `cancelled` reachable
//! from any non-terminal state. Opening an intervention pins its parent
//! Sheet: the orchestrator (C6) must not advance a sheet past any stage
//! that would finalize results while it has an open intervention.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain::errors` - manual-impl domain errors.
//! - `domain::queue` - the `BinaryHeap` priority index.
//! - `ports::inbound` - the [`InterventionQueue`] trait.
//! - `service` - the concrete implementation backed by `omr-store`.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::InterventionError;
pub use domain::queue::NextFilter;
pub use ports::inbound::InterventionQueue;
pub use service::InterventionService;
