//! # Ancestry Queries
//!
//! Questions about two linked blocks, answered from their depth and chain
//! interval alone. No parent pointer is ever followed.
//!
//! - `a` is an ancestor of `b` exactly when `a` is shallower and `a`'s
//!   interval contains `b`'s.
//! - Records sharing one unforked chain id have identical intervals; depth
//!   tells them apart.
//! - Anything else sits on a different branch.

use std::collections::HashMap;
use std::fmt;

use crate::storage::{BlockHash, BlockRecord, Linkage, RecordStore, StoreError};

/// How block `b` relates to block `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Same,
    /// `a` is an ancestor of `b`, `distance` generations up.
    Ancestor { distance: u64 },
    /// `a` is a descendant of `b`, `distance` generations down.
    Descendant { distance: u64 },
    /// `a` and `b` are on different branches. `depth_delta` is
    /// `b.depth - a.depth`.
    Forked { depth_delta: i64 },
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Same => write!(f, "same block"),
            Relation::Ancestor { distance } => write!(f, "ancestor ({distance} blocks up)"),
            Relation::Descendant { distance } => write!(f, "descendant ({distance} blocks down)"),
            Relation::Forked { depth_delta } => {
                write!(f, "different branches (depth delta {depth_delta:+})")
            }
        }
    }
}

/// True if `a` is a strict ancestor of `b`.
pub fn is_ancestor(a: &Linkage, b: &Linkage) -> bool {
    a.depth < b.depth && a.interval.contains(&b.interval)
}

/// Relation between two linked positions.
pub fn relation(a: &Linkage, b: &Linkage) -> Relation {
    if a == b {
        Relation::Same
    } else if is_ancestor(a, b) {
        Relation::Ancestor {
            distance: b.depth - a.depth,
        }
    } else if is_ancestor(b, a) {
        Relation::Descendant {
            distance: a.depth - b.depth,
        }
    } else {
        Relation::Forked {
            depth_delta: b.depth as i64 - a.depth as i64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown block {0}")]
    Unknown(BlockHash),

    #[error("block {0} is not linked yet")]
    Pending(BlockHash),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Counts describing the current shape of the forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForestStats {
    pub total: usize,
    pub linked: usize,
    pub pending: usize,
    pub roots: usize,
    pub tips: usize,
    pub max_depth: Option<u64>,
}

/// Read-only query view over a record store.
pub struct Forest<'a, S> {
    store: &'a S,
}

impl<'a, S: RecordStore> Forest<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn record(&self, hash: &BlockHash) -> QueryResult<BlockRecord> {
        self.store
            .find_by_hash(hash)?
            .ok_or(QueryError::Unknown(*hash))
    }

    pub fn linkage(&self, hash: &BlockHash) -> QueryResult<Linkage> {
        self.record(hash)?
            .linkage
            .ok_or(QueryError::Pending(*hash))
    }

    pub fn is_ancestor(&self, a: &BlockHash, b: &BlockHash) -> QueryResult<bool> {
        Ok(is_ancestor(&self.linkage(a)?, &self.linkage(b)?))
    }

    pub fn relation(&self, a: &BlockHash, b: &BlockHash) -> QueryResult<Relation> {
        if a == b {
            // Still reject unknown or pending blocks.
            self.linkage(a)?;
            return Ok(Relation::Same);
        }
        Ok(relation(&self.linkage(a)?, &self.linkage(b)?))
    }

    /// Linked records with no deeper linked record below them.
    ///
    /// Forked records are never tips, and along one chain id the deepest
    /// record is the tip. Ordered by chain id.
    pub fn tips(&self) -> QueryResult<Vec<BlockRecord>> {
        let mut deepest: HashMap<u64, BlockRecord> = HashMap::new();
        for record in self.store.linked_records()? {
            let Some(chain_id) = record.interval().and_then(|i| i.chain_id()) else {
                continue;
            };
            let deeper = deepest
                .get(&chain_id)
                .map_or(true, |current| record.depth() > current.depth());
            if deeper {
                deepest.insert(chain_id, record);
            }
        }

        let mut tips: Vec<(u64, BlockRecord)> = deepest.into_iter().collect();
        tips.sort_by_key(|(chain_id, _)| *chain_id);
        Ok(tips.into_iter().map(|(_, record)| record).collect())
    }

    pub fn stats(&self) -> QueryResult<ForestStats> {
        let total = self.store.record_count()?;
        let linked = self.store.linked_records()?;
        Ok(ForestStats {
            total,
            linked: linked.len(),
            pending: total.saturating_sub(linked.len()),
            roots: linked.iter().filter(|r| r.depth() == Some(0)).count(),
            tips: self.tips()?.len(),
            max_depth: linked.iter().filter_map(BlockRecord::depth).max(),
        })
    }
}
