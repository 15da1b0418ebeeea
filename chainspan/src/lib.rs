// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # chainspan: Block Forest Organizer
//!
//! Block headers arrive in whatever order the network hands them to us.
//! This crate turns that stream into an explicit forest of chain history in
//! which every linked block carries a `depth` and a chain interval
//! `(left, right)`. With those two fields, "is X an ancestor of Y" and
//! "how do X and Y relate" are answered by comparing four integers instead
//! of walking parent pointers.
//!
//! ## Architecture
//!
//! - **storage**: The `BlockRecord` model, the `RecordStore` contract, and
//!   two implementations: `MemoryStore` and the sled-backed `ForestDb`.
//! - **forest**: The interval allocator, the organizer that links pending
//!   blocks, and the ancestry queries built on the intervals.
//! - **config**: Constants and the `OrganizerConfig`.
//! - **error**: Errors surfaced by an organizer pass.
//!
//! ## Interval Invariant
//!
//! ```text
//!            R (0,2)
//!          /    |    \
//!    A (0,0)  B (1,1)  C (2,2)
//!       |
//!    D (0,0)
//! ```
//!
//! A descendant's interval is always contained in each ancestor's interval,
//! sibling branches are disjoint, and an unforked branch shares a single
//! chain id (`left == right`) from its fork point down to its tip.

pub mod config;
pub mod error;
pub mod forest;
pub mod storage;

pub use config::OrganizerConfig;
pub use error::{OrganizeError, OrganizeResult};
pub use forest::{Forest, OrganizeReport, Organizer, Relation, SettleReport, ShiftPlan};
pub use storage::{
    BlockHash, BlockId, BlockRecord, ChainInterval, ForestDb, Linkage, MemoryStore, RecordStore,
    StoreError,
};
