//! Errors surfaced by an organizer pass.
//!
//! A block whose parent has not arrived yet is not an error: it stays
//! pending and is retried on the next pass. Only corruption of the interval
//! forest and failures of the underlying store reach the caller.

use crate::storage::{BlockHash, BlockId, ChainInterval, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// A parent with no descendants carries a widened interval. The forest
    /// was corrupted by an earlier write, so the pass stops before touching
    /// anything else.
    #[error(
        "interval invariant violated: block {id} would extend tip {parent} whose interval {interval} is not a single chain id"
    )]
    InvariantViolation {
        id: BlockId,
        parent: BlockHash,
        interval: ChainInterval,
    },

    #[error("record store failure: {0}")]
    Store(#[from] StoreError),
}

pub type OrganizeResult<T> = Result<T, OrganizeError>;
