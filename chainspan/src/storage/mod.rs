//! # Storage Module
//!
//! Everything the organizer knows about blocks goes through the
//! [`RecordStore`] trait. Any engine that offers these few operations with
//! the documented semantics can back the forest.
//!
//! ## Architecture
//!
//! ```text
//! record.rs  BlockRecord, BlockHash, BlockId, ChainInterval, Linkage
//! memory.rs  MemoryStore: BTreeMap-backed, for tests and embedding
//! db.rs      ForestDb: sled persistence with an atomic shift batch
//! ```
//!
//! ## Atomicity
//!
//! `shift_intervals` rewrites an unbounded number of records. It must land
//! all at once or not at all: a forest in which only some bounds moved
//! breaks containment for every query that runs against it.

pub mod db;
pub mod memory;
pub mod record;

pub use db::ForestDb;
pub use memory::MemoryStore;
pub use record::{BlockHash, BlockId, BlockRecord, ChainInterval, HashParseError, Linkage};

use crate::forest::ShiftPlan;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("block {0} not found")]
    NotFound(BlockId),

    #[error("block {0} is already linked")]
    AlreadyLinked(BlockId),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Keyed storage of block records, as consumed by the organizer.
pub trait RecordStore {
    /// Store a pending record and return its id.
    ///
    /// A hash that is already stored is left untouched and its existing id
    /// is returned, so replayed headers are harmless.
    fn create_pending(&mut self, hash: BlockHash, prev_hash: BlockHash) -> StoreResult<BlockId>;

    /// Store (or link, if pending) a root record at depth 0 on a fresh
    /// chain id past every interval in use. Already linked records are
    /// returned unchanged.
    fn create_root(&mut self, hash: BlockHash) -> StoreResult<BlockId>;

    fn find_by_hash(&self, hash: &BlockHash) -> StoreResult<Option<BlockRecord>>;

    /// All pending records, ascending id.
    fn list_pending_ordered_by_id(&self) -> StoreResult<Vec<BlockRecord>>;

    /// The record with hash `prev_hash`, only if it is linked.
    fn find_linked_parent(&self, prev_hash: &BlockHash) -> StoreResult<Option<BlockRecord>> {
        Ok(self.find_by_hash(prev_hash)?.filter(BlockRecord::is_linked))
    }

    /// True if some linked record's interval lies inside `interval`
    /// (inclusive on both ends) at a depth greater than `depth`.
    fn has_descendant_with_greater_depth(
        &self,
        interval: &ChainInterval,
        depth: u64,
    ) -> StoreResult<bool>;

    /// True if some linked record deeper than `depth` has `chain_id` within
    /// its interval, i.e. the chain id is already handed out below that depth.
    fn slot_in_use(&self, chain_id: u64, depth: u64) -> StoreResult<bool>;

    /// Link a pending record.
    fn set_linked(&mut self, id: BlockId, linkage: Linkage) -> StoreResult<()>;

    /// Apply `plan` to every linked record as one all-or-nothing write.
    fn shift_intervals(&mut self, plan: &ShiftPlan) -> StoreResult<()>;

    /// All linked records, ascending id.
    fn linked_records(&self) -> StoreResult<Vec<BlockRecord>>;

    /// Number of stored records, pending ones included.
    fn record_count(&self) -> StoreResult<usize>;
}

/// Chain id for a new root: one past the highest right bound in use.
pub(crate) fn next_root_chain_id<'a>(linked: impl Iterator<Item = &'a Linkage>) -> u64 {
    linked
        .map(|l| l.interval.right + 1)
        .max()
        .unwrap_or(0)
}
