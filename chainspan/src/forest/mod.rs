//! # Forest Module
//!
//! The bookkeeping that turns pending block records into an interval
//! forest, and the queries that forest makes cheap.
//!
//! ```text
//! allocator.rs  ShiftPlan: frees a chain id next to a parent's interval
//! organizer.rs  Organizer: links pending records, pass by pass
//! query.rs      Forest: ancestry and fork relations, tips, statistics
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! RecordStore ──pending──▶ Organizer ──fork──▶ ShiftPlan
//!      ▲                       │                   │
//!      └──────set_linked───────┘◀──shift_intervals─┘
//! ```

pub mod allocator;
pub mod organizer;
pub mod query;

pub use allocator::ShiftPlan;
pub use organizer::{OrganizeReport, Organizer, SettleReport};
pub use query::{is_ancestor, relation, Forest, ForestStats, QueryError, Relation};
