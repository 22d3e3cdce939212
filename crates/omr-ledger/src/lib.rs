//! # Hash-Chained Ledger (C1)
//!
//! A single-writer, append-only sequence of [`LedgerBlock`](shared_types::LedgerBlock)
//! values recording every state transition of the evaluation pipeline.
//!
//! ## Block Layout
//!
//! Each block commits to its payload via a binary Merkle root and chains to
//! its predecessor via `prev_hash`. `self_hash` covers every other field,
//! including a mined `nonce` that must satisfy the configured difficulty
//! predicate (leading hex zeros).
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Merkle tree, mining, multi-signature policy, pure chain logic
//! - `ports/` - port traits (inbound API, outbound chain store)
//! - `service.rs` - application service implementing the API
//!
//! ## Concurrency
//!
//! A single exclusive writer; readers are non-blocking and observe the
//! chain as of the latest fsynced head (see §5 of the coordinator design).

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::errors::ChainError;
pub use domain::merkle::merkle_root;
pub use domain::mining::{mine_block, signable_digest, BlockMaterial, DifficultyConfig};
pub use domain::policy::{verify_signatures, SignaturePolicy};
pub use ports::inbound::LedgerApi;
pub use ports::outbound::{ChainStore, FileChainStore, InMemoryChainStore};
pub use service::{LedgerConfig, LedgerService};
