//! # Shared Crypto
//!
//! Hashing and signature primitives shared by every crate in the OMR
//! evaluation pipeline workspace: ledger self-hash/Merkle-root
//! computation and multi-signature commitment verification.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | BLAKE3 | Block self-hash, Merkle root |
//! | `signatures` | Ed25519 | Multi-signature commitment policy |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency
//! - **BLAKE3**: SIMD-accelerated, 5-10x faster than SHA-256

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{blake3_hash, Blake3Hasher};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
