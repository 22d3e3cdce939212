//! # Outbound Ports (Driven Ports)
//!
//! The storage dependency the ledger service requires: an append-only,
//! fsync-backed sequence of blocks.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;

use shared_types::{ChainError, Hash, LedgerBlock};

/// Abstract interface for durable block storage.
///
/// Production: `FileChainStore` below, one block per line of a journal
/// file, fsynced on every append.
/// Testing: `InMemoryChainStore`.
pub trait ChainStore: Send + Sync {
    /// Append `block` to the store. Implementations must fsync before
    /// returning `Ok`.
    fn append(&mut self, block: LedgerBlock) -> Result<(), ChainError>;

    /// Fetch a block by hash.
    fn get_by_hash(&self, hash: &Hash) -> Option<LedgerBlock>;

    /// Fetch a block by index.
    fn get_by_index(&self, index: u64) -> Option<LedgerBlock>;

    /// The highest-index block currently stored.
    fn head(&self) -> Option<LedgerBlock>;

    /// All blocks in index order, for `validate()`.
    fn iter_all(&self) -> Vec<LedgerBlock>;
}

/// In-memory chain store for tests and the in-process test harness.
#[derive(Default)]
pub struct InMemoryChainStore {
    blocks: Vec<LedgerBlock>,
    by_hash: HashMap<Hash, u64>,
}

impl InMemoryChainStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for InMemoryChainStore {
    fn append(&mut self, block: LedgerBlock) -> Result<(), ChainError> {
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(ChainError::ChainStale {
                expected,
                actual: block.index,
            });
        }
        self.by_hash.insert(block.self_hash, block.index);
        self.blocks.push(block);
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash) -> Option<LedgerBlock> {
        self.by_hash
            .get(hash)
            .and_then(|i| self.blocks.get(*i as usize).cloned())
    }

    fn get_by_index(&self, index: u64) -> Option<LedgerBlock> {
        self.blocks.get(index as usize).cloned()
    }

    fn head(&self) -> Option<LedgerBlock> {
        self.blocks.last().cloned()
    }

    fn iter_all(&self) -> Vec<LedgerBlock> {
        self.blocks.clone()
    }
}

/// File-backed chain store: a sequence of length-prefixed,
/// canonically-serialized records, fsynced on every append. Suitable for
/// single-node deployment without a database.
///
/// On-disk record layout, back to back with no separator:
/// `[body_len: u32 LE][body: body_len bytes of JSON][self_hash: 64 ASCII
/// hex bytes]`. The hex suffix lets a reader recover the chain up to the
/// last complete record without re-parsing JSON, and `open` stops
/// replaying (rather than erroring) the moment a record is torn by a
/// crash mid-write, matching the file only ever growing by append.
pub struct FileChainStore {
    path: PathBuf,
    blocks: Vec<LedgerBlock>,
    by_hash: HashMap<Hash, u64>,
}

const HASH_HEX_LEN: usize = 64;

impl FileChainStore {
    /// Open (or create) the ledger file at `path`, replaying any
    /// existing complete records into memory. A trailing torn record
    /// (truncated by a crash mid-write) is silently dropped rather than
    /// treated as an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ChainError> {
        let path = path.into();
        let mut blocks = Vec::new();
        let mut by_hash = HashMap::new();

        if let Ok(bytes) = std::fs::read(&path) {
            let mut cursor = 0usize;
            while cursor + 4 <= bytes.len() {
                let body_len =
                    u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
                let body_start = cursor + 4;
                let hash_start = body_start + body_len;
                let record_end = hash_start + HASH_HEX_LEN;
                if record_end > bytes.len() {
                    // Torn write: the last record never finished landing
                    // on disk. Stop here and keep everything before it.
                    break;
                }

                let body = &bytes[body_start..hash_start];
                let block: LedgerBlock = serde_json::from_slice(body).map_err(|e| {
                    ChainError::IntegrityViolation {
                        index: blocks.len() as u64,
                        reason: format!("journal decode failed: {e}"),
                    }
                })?;

                let hash_hex = &bytes[hash_start..record_end];
                let recorded_hash = decode_hash_hex(hash_hex, blocks.len() as u64)?;
                if recorded_hash != block.self_hash {
                    return Err(ChainError::IntegrityViolation {
                        index: blocks.len() as u64,
                        reason: "self_hash suffix does not match record body".to_string(),
                    });
                }

                by_hash.insert(block.self_hash, block.index);
                blocks.push(block);
                cursor = record_end;
            }
        }

        Ok(Self {
            path,
            blocks,
            by_hash,
        })
    }
}

fn decode_hash_hex(hex_bytes: &[u8], index: u64) -> Result<Hash, ChainError> {
    let hex_str = std::str::from_utf8(hex_bytes).map_err(|_| ChainError::IntegrityViolation {
        index,
        reason: "self_hash suffix is not valid UTF-8".to_string(),
    })?;
    let decoded = hex::decode(hex_str).map_err(|e| ChainError::IntegrityViolation {
        index,
        reason: format!("self_hash suffix decode failed: {e}"),
    })?;
    decoded
        .try_into()
        .map_err(|_| ChainError::IntegrityViolation {
            index,
            reason: "self_hash suffix is not 32 bytes".to_string(),
        })
}

impl ChainStore for FileChainStore {
    fn append(&mut self, block: LedgerBlock) -> Result<(), ChainError> {
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(ChainError::ChainStale {
                expected,
                actual: block.index,
            });
        }

        let body = serde_json::to_vec(&block).map_err(|e| ChainError::IntegrityViolation {
            index: block.index,
            reason: format!("journal encode failed: {e}"),
        })?;

        let mut record = Vec::with_capacity(4 + body.len() + HASH_HEX_LEN);
        record.extend_from_slice(&(body.len() as u32).to_le_bytes());
        record.extend_from_slice(&body);
        record.extend_from_slice(hex::encode(block.self_hash).as_bytes());

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ChainError::IntegrityViolation {
                index: block.index,
                reason: format!("journal open failed: {e}"),
            })?;
        file.write_all(&record).map_err(|e| ChainError::IntegrityViolation {
            index: block.index,
            reason: format!("journal write failed: {e}"),
        })?;
        file.sync_all().map_err(|e| ChainError::IntegrityViolation {
            index: block.index,
            reason: format!("journal fsync failed: {e}"),
        })?;

        self.by_hash.insert(block.self_hash, block.index);
        self.blocks.push(block);
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash) -> Option<LedgerBlock> {
        self.by_hash
            .get(hash)
            .and_then(|i| self.blocks.get(*i as usize).cloned())
    }

    fn get_by_index(&self, index: u64) -> Option<LedgerBlock> {
        self.blocks.get(index as usize).cloned()
    }

    fn head(&self) -> Option<LedgerBlock> {
        self.blocks.last().cloned()
    }

    fn iter_all(&self) -> Vec<LedgerBlock> {
        self.blocks.clone()
    }
}
