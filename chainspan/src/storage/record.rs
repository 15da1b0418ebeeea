//! # Block Records
//!
//! One [`BlockRecord`] exists per block header the store has seen. A record
//! starts out pending (no [`Linkage`]) and becomes linked exactly once, when
//! the organizer attaches it below a linked parent.
//!
//! ## Record Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  BlockRecord                                 │
//! │  ├── id: BlockId          (arrival order)    │
//! │  ├── hash: BlockHash      (32 bytes)         │
//! │  ├── prev_hash: BlockHash (32 bytes)         │
//! │  └── linkage: Option<Linkage>                │
//! │        ├── depth: u64                        │
//! │        └── interval: ChainInterval           │
//! │              ├── left: u64                   │
//! │              └── right: u64                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Depth and interval are set together or not at all, which is why they
//! share one `Option`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{HASH_HEX_LENGTH, HASH_LENGTH};

// ---------------------------------------------------------------------------
// BlockHash
// ---------------------------------------------------------------------------

/// 32-byte content identifier of a block header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHash([u8; HASH_LENGTH]);

/// Reasons a string is not a valid [`BlockHash`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl BlockHash {
    /// All-zero hash, conventionally the parent of a genesis header.
    pub const ZERO: BlockHash = BlockHash([0u8; HASH_LENGTH]);

    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        BlockHash(bytes)
    }

    /// Derive a hash from arbitrary bytes with BLAKE3.
    pub fn digest(data: &[u8]) -> Self {
        BlockHash(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let s = s.trim();
        if s.len() != HASH_HEX_LENGTH {
            return Err(HashParseError::Length(s.len()));
        }
        let mut bytes = [0u8; HASH_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(BlockHash(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex characters are enough to tell hashes apart in logs.
        write!(f, "BlockHash({}..)", &self.to_hex()[..8])
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LENGTH]> for BlockHash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        BlockHash(bytes)
    }
}

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Surrogate key assigned by the store, strictly increasing in arrival order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Big-endian key bytes, so lexicographic order matches numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = bytes.try_into().ok()?;
        Some(BlockId(u64::from_be_bytes(bytes)))
    }

    pub fn next(self) -> Self {
        BlockId(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChainInterval
// ---------------------------------------------------------------------------

/// Inclusive range of chain ids covered by a record and its descendants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainInterval {
    pub left: u64,
    pub right: u64,
}

impl ChainInterval {
    pub fn new(left: u64, right: u64) -> Self {
        debug_assert!(left <= right, "interval ({left}, {right}) is inverted");
        Self { left, right }
    }

    /// Interval of an unforked branch: both bounds equal the chain id.
    pub fn single(chain_id: u64) -> Self {
        Self {
            left: chain_id,
            right: chain_id,
        }
    }

    /// Inclusive containment: `self.left <= other.left && other.right <= self.right`.
    pub fn contains(&self, other: &ChainInterval) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    pub fn overlaps(&self, other: &ChainInterval) -> bool {
        self.left <= other.right && other.left <= self.right
    }

    /// The chain id, if this interval has not forked.
    pub fn chain_id(&self) -> Option<u64> {
        (self.left == self.right).then_some(self.left)
    }

    pub fn is_single(&self) -> bool {
        self.left == self.right
    }
}

impl fmt::Display for ChainInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

// ---------------------------------------------------------------------------
// Linkage & BlockRecord
// ---------------------------------------------------------------------------

/// Position of a linked record in the forest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    pub depth: u64,
    pub interval: ChainInterval,
}

impl Linkage {
    pub fn new(depth: u64, interval: ChainInterval) -> Self {
        Self { depth, interval }
    }

    /// Linkage of a child that continues this record's chain id.
    pub fn extend(&self, chain_id: u64) -> Self {
        Self {
            depth: self.depth + 1,
            interval: ChainInterval::single(chain_id),
        }
    }
}

/// Metadata of one block header as known to the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    pub hash: BlockHash,
    /// Parent hash. Need not resolve to a stored record.
    pub prev_hash: BlockHash,
    /// `None` while the record is pending.
    pub linkage: Option<Linkage>,
}

impl BlockRecord {
    pub fn pending(id: BlockId, hash: BlockHash, prev_hash: BlockHash) -> Self {
        Self {
            id,
            hash,
            prev_hash,
            linkage: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linkage.is_some()
    }

    pub fn depth(&self) -> Option<u64> {
        self.linkage.map(|l| l.depth)
    }

    pub fn interval(&self) -> Option<ChainInterval> {
        self.linkage.map(|l| l.interval)
    }
}
