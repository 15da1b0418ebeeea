//! # Organizer
//!
//! Links pending block records into the interval forest. One call to
//! [`Organizer::organize`] is one pass over the pending records in arrival
//! order. For each record:
//!
//! 1. No linked parent yet → leave it pending. Orphans are not errors.
//! 2. Parent is a tip (no deeper linked record inside its interval) →
//!    link on the parent's chain id at `depth + 1`.
//! 3. Parent already has a child, but the slot at its right bound is still
//!    vacant (freed by an earlier shift) → link there.
//! 4. Otherwise → have the allocator free a slot next to the parent and
//!    leave the record pending. It claims the slot on the next pass.
//!
//! Sibling chain ids follow link order, not arrival order: a later sibling
//! that reaches step 3 first takes the slot an earlier one reserved, and the
//! earlier one reserves again.
//!
//! A pass never re-scans: a record can extend a parent linked earlier in
//! the same pass, but a backlog of `n` unresolved generations needs `n`
//! passes, and every fork needs one extra. [`Organizer::organize_until_settled`]
//! repeats passes until nothing changes.

use tracing::{debug, error, info, warn};

use super::allocator::ShiftPlan;
use super::query::Forest;
use crate::config::OrganizerConfig;
use crate::error::{OrganizeError, OrganizeResult};
use crate::storage::{BlockHash, BlockId, BlockRecord, Linkage, RecordStore};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of a single organizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    /// Pending records examined.
    pub scanned: usize,
    /// Records linked during the pass.
    pub linked: usize,
    /// Forks for which a new chain id was reserved.
    pub forks_reserved: usize,
    /// Records still pending when the pass ended.
    pub still_pending: usize,
}

impl OrganizeReport {
    /// A pass that changed nothing: another pass would not either.
    pub fn is_fixed_point(&self) -> bool {
        self.linked == 0 && self.forks_reserved == 0
    }
}

/// Outcome of repeated passes until a fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleReport {
    pub passes: usize,
    pub linked: usize,
    pub forks_reserved: usize,
    pub still_pending: usize,
    /// False when the pass cap was reached before a fixed point.
    pub settled: bool,
}

impl SettleReport {
    fn absorb(&mut self, pass: &OrganizeReport) {
        self.passes += 1;
        self.linked += pass.linked;
        self.forks_reserved += pass.forks_reserved;
        self.still_pending = pass.still_pending;
    }
}

/// What happened to one pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Unresolved,
    Linked(Linkage),
    Reserved { slot: u64 },
}

// ---------------------------------------------------------------------------
// Organizer
// ---------------------------------------------------------------------------

/// Drives linking passes over an injected [`RecordStore`].
///
/// The organizer owns its store for the duration of its life, so nothing
/// else can write to the forest while a pass is running.
#[derive(Debug)]
pub struct Organizer<S> {
    store: S,
    config: OrganizerConfig,
}

impl<S: RecordStore> Organizer<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, OrganizerConfig::default())
    }

    pub fn with_config(store: S, config: OrganizerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Read-only query view over the current forest.
    pub fn forest(&self) -> Forest<'_, S> {
        Forest::new(&self.store)
    }

    /// Store a newly received header as pending. Organize afterwards.
    pub fn ingest(&mut self, hash: BlockHash, prev_hash: BlockHash) -> OrganizeResult<BlockId> {
        let id = self.store.create_pending(hash, prev_hash)?;
        debug!(%id, hash = %hash, prev = %prev_hash, "header ingested");
        Ok(id)
    }

    /// Store a root header, linked at depth 0 on a fresh chain id.
    pub fn add_root(&mut self, hash: BlockHash) -> OrganizeResult<BlockId> {
        let id = self.store.create_root(hash)?;
        info!(%id, hash = %hash, "root linked");
        Ok(id)
    }

    /// Run one linking pass over every pending record, in arrival order.
    pub fn organize(&mut self) -> OrganizeResult<OrganizeReport> {
        let pending = self.store.list_pending_ordered_by_id()?;
        let mut report = OrganizeReport {
            scanned: pending.len(),
            ..Default::default()
        };

        for record in &pending {
            match self.link_one(record)? {
                Step::Unresolved => {}
                Step::Linked(linkage) => {
                    report.linked += 1;
                    debug!(
                        id = %record.id,
                        hash = %record.hash,
                        depth = linkage.depth,
                        interval = %linkage.interval,
                        "block linked"
                    );
                }
                Step::Reserved { slot } => {
                    report.forks_reserved += 1;
                    info!(
                        id = %record.id,
                        hash = %record.hash,
                        parent = %record.prev_hash,
                        slot,
                        "fork detected, chain id reserved"
                    );
                }
            }
        }

        report.still_pending = report.scanned - report.linked;
        if report.is_fixed_point() {
            debug!(pending = report.still_pending, "organize pass: no progress");
        } else {
            info!(
                scanned = report.scanned,
                linked = report.linked,
                forks = report.forks_reserved,
                pending = report.still_pending,
                "organize pass complete"
            );
        }
        Ok(report)
    }

    /// Repeat [`organize`](Self::organize) until a pass changes nothing or
    /// the configured pass cap is reached.
    pub fn organize_until_settled(&mut self) -> OrganizeResult<SettleReport> {
        let mut settle = SettleReport::default();
        while settle.passes < self.config.max_passes {
            let pass = self.organize()?;
            settle.absorb(&pass);
            if pass.is_fixed_point() || pass.still_pending == 0 {
                settle.settled = true;
                break;
            }
        }

        if !settle.settled {
            warn!(
                passes = settle.passes,
                pending = settle.still_pending,
                "pass cap reached before the forest settled"
            );
        }
        Ok(settle)
    }

    fn link_one(&mut self, record: &BlockRecord) -> OrganizeResult<Step> {
        let Some(parent) = self.store.find_linked_parent(&record.prev_hash)? else {
            return Ok(Step::Unresolved);
        };
        let Some(parent_link) = parent.linkage else {
            return Ok(Step::Unresolved);
        };

        let has_children = self
            .store
            .has_descendant_with_greater_depth(&parent_link.interval, parent_link.depth)?;

        if !has_children {
            let Some(chain_id) = parent_link.interval.chain_id() else {
                error!(
                    id = %record.id,
                    parent = %parent.hash,
                    interval = %parent_link.interval,
                    "tip with a forked interval"
                );
                return Err(OrganizeError::InvariantViolation {
                    id: record.id,
                    parent: parent.hash,
                    interval: parent_link.interval,
                });
            };
            return self.link(record.id, parent_link.extend(chain_id));
        }

        // A slot freed by an earlier shift sits at the parent's right bound
        // until some child takes it. A forked child branch may span that
        // bound with its own vacancy, so check coverage, not containment.
        let slot = parent_link.interval.right;
        if !self.store.slot_in_use(slot, parent_link.depth)? {
            return self.link(record.id, parent_link.extend(slot));
        }

        let plan = ShiftPlan::for_parent(&parent_link);
        self.store.shift_intervals(&plan)?;
        Ok(Step::Reserved { slot: plan.slot() })
    }

    fn link(&mut self, id: BlockId, linkage: Linkage) -> OrganizeResult<Step> {
        self.store.set_linked(id, linkage)?;
        Ok(Step::Linked(linkage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ChainInterval, MemoryStore, StoreError, StoreResult};

    fn h(label: &str) -> BlockHash {
        BlockHash::digest(label.as_bytes())
    }

    fn organizer_with_root() -> Organizer<MemoryStore> {
        let mut organizer = Organizer::new(MemoryStore::new());
        organizer.add_root(h("R")).unwrap();
        organizer
    }

    fn linkage(organizer: &Organizer<MemoryStore>, label: &str) -> Option<Linkage> {
        organizer
            .store()
            .find_by_hash(&h(label))
            .unwrap()
            .and_then(|r| r.linkage)
    }

    #[test]
    fn extends_a_tip_on_its_chain_id() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("B1"), h("R")).unwrap();

        let report = organizer.organize().unwrap();
        assert_eq!(report.linked, 1);
        assert_eq!(
            linkage(&organizer, "B1"),
            Some(Linkage::new(1, ChainInterval::single(0)))
        );
    }

    #[test]
    fn fork_reserves_then_links_on_next_pass() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("B1"), h("R")).unwrap();
        organizer.organize().unwrap();
        organizer.ingest(h("B2"), h("R")).unwrap();

        let first = organizer.organize().unwrap();
        assert_eq!(first.forks_reserved, 1);
        assert_eq!(first.linked, 0);
        assert_eq!(linkage(&organizer, "B2"), None);
        assert_eq!(
            linkage(&organizer, "R").unwrap().interval,
            ChainInterval::new(0, 1)
        );

        let second = organizer.organize().unwrap();
        assert_eq!(second.linked, 1);
        assert_eq!(
            linkage(&organizer, "B2"),
            Some(Linkage::new(1, ChainInterval::single(1)))
        );
        assert_eq!(
            linkage(&organizer, "B1"),
            Some(Linkage::new(1, ChainInterval::single(0)))
        );
    }

    #[test]
    fn child_links_behind_parent_in_same_pass() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("A"), h("R")).unwrap();
        organizer.ingest(h("B"), h("A")).unwrap();

        let report = organizer.organize().unwrap();
        assert_eq!(report.linked, 2);
        assert_eq!(linkage(&organizer, "B").unwrap().depth, 2);
    }

    #[test]
    fn child_ahead_of_parent_waits_a_pass() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("B"), h("A")).unwrap();
        organizer.ingest(h("A"), h("R")).unwrap();

        assert_eq!(organizer.organize().unwrap().linked, 1);
        assert_eq!(linkage(&organizer, "B"), None);
        assert_eq!(organizer.organize().unwrap().linked, 1);
        assert_eq!(linkage(&organizer, "B").unwrap().depth, 2);
    }

    #[test]
    fn orphan_stays_pending_without_error() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("O"), h("nowhere")).unwrap();

        for _ in 0..3 {
            let report = organizer.organize().unwrap();
            assert!(report.is_fixed_point());
            assert_eq!(report.still_pending, 1);
        }
    }

    #[test]
    fn settle_stops_at_fixed_point() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("B1"), h("R")).unwrap();
        organizer.ingest(h("B2"), h("R")).unwrap();
        organizer.ingest(h("O"), h("nowhere")).unwrap();

        let settle = organizer.organize_until_settled().unwrap();
        assert!(settle.settled);
        assert_eq!(settle.linked, 2);
        assert_eq!(settle.forks_reserved, 1);
        assert_eq!(settle.still_pending, 1);
    }

    #[test]
    fn settle_reports_pass_cap() {
        let config = OrganizerConfig { max_passes: 1 };
        let mut organizer = Organizer::with_config(MemoryStore::new(), config);
        organizer.add_root(h("R")).unwrap();
        organizer.ingest(h("B"), h("A")).unwrap();
        organizer.ingest(h("A"), h("R")).unwrap();

        let settle = organizer.organize_until_settled().unwrap();
        assert_eq!(settle.passes, 1);
        assert!(!settle.settled);
        assert_eq!(settle.still_pending, 1);
    }

    #[test]
    fn later_sibling_may_claim_reserved_slot_first() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("B1"), h("R")).unwrap();
        organizer.organize().unwrap();
        organizer.ingest(h("B2"), h("R")).unwrap();
        organizer.ingest(h("B3"), h("R")).unwrap();

        // B2 reserves slot 1, B3 claims it in the same pass.
        let first = organizer.organize().unwrap();
        assert_eq!((first.forks_reserved, first.linked), (1, 1));
        assert_eq!(
            linkage(&organizer, "B3").unwrap().interval,
            ChainInterval::single(1)
        );

        organizer.organize_until_settled().unwrap();
        assert_eq!(
            linkage(&organizer, "B2").unwrap().interval,
            ChainInterval::single(2)
        );
        assert_eq!(
            linkage(&organizer, "R").unwrap().interval,
            ChainInterval::new(0, 2)
        );
    }

    #[test]
    fn vacancy_inside_a_child_branch_is_not_the_parents() {
        let mut organizer = organizer_with_root();
        organizer.ingest(h("A"), h("R")).unwrap();
        organizer.ingest(h("B"), h("R")).unwrap();
        organizer.ingest(h("B1"), h("B")).unwrap();
        organizer.organize_until_settled().unwrap();

        // B2 reserves slot 2 inside B. C, a child of R, must not take it.
        organizer.ingest(h("B2"), h("B")).unwrap();
        organizer.ingest(h("C"), h("R")).unwrap();
        let first = organizer.organize().unwrap();
        assert_eq!(first.forks_reserved, 2);
        assert_eq!(first.linked, 0);
        assert_eq!(
            linkage(&organizer, "B").unwrap().interval,
            ChainInterval::new(1, 2)
        );

        organizer.organize_until_settled().unwrap();
        assert_eq!(
            linkage(&organizer, "B2"),
            Some(Linkage::new(2, ChainInterval::single(2)))
        );
        assert_eq!(
            linkage(&organizer, "C"),
            Some(Linkage::new(1, ChainInterval::single(3)))
        );
        assert_eq!(
            linkage(&organizer, "R").unwrap().interval,
            ChainInterval::new(0, 3)
        );
    }

    #[test]
    fn forked_tip_is_an_invariant_violation() {
        let mut store = MemoryStore::new();
        store.create_root(h("R")).unwrap();
        // Widen the childless root by hand: corrupts the forest.
        let root = store.find_by_hash(&h("R")).unwrap().unwrap();
        store
            .shift_intervals(&ShiftPlan::for_parent(&root.linkage.unwrap()))
            .unwrap();
        store.create_pending(h("B"), h("R")).unwrap();
        store.create_pending(h("C"), h("R")).unwrap();

        let mut organizer = Organizer::new(store);
        let err = organizer.organize().unwrap_err();
        assert!(matches!(err, OrganizeError::InvariantViolation { .. }));
        // The pass stopped before writing anything for either record.
        assert_eq!(organizer.store().list_pending_ordered_by_id().unwrap().len(), 2);
    }

    /// Store whose shift always fails, to check error propagation.
    struct FailingShift(MemoryStore);

    impl RecordStore for FailingShift {
        fn create_pending(&mut self, hash: BlockHash, prev: BlockHash) -> StoreResult<BlockId> {
            self.0.create_pending(hash, prev)
        }
        fn create_root(&mut self, hash: BlockHash) -> StoreResult<BlockId> {
            self.0.create_root(hash)
        }
        fn find_by_hash(&self, hash: &BlockHash) -> StoreResult<Option<BlockRecord>> {
            self.0.find_by_hash(hash)
        }
        fn list_pending_ordered_by_id(&self) -> StoreResult<Vec<BlockRecord>> {
            self.0.list_pending_ordered_by_id()
        }
        fn has_descendant_with_greater_depth(
            &self,
            interval: &ChainInterval,
            depth: u64,
        ) -> StoreResult<bool> {
            self.0.has_descendant_with_greater_depth(interval, depth)
        }
        fn slot_in_use(&self, chain_id: u64, depth: u64) -> StoreResult<bool> {
            self.0.slot_in_use(chain_id, depth)
        }
        fn set_linked(&mut self, id: BlockId, linkage: Linkage) -> StoreResult<()> {
            self.0.set_linked(id, linkage)
        }
        fn shift_intervals(&mut self, _plan: &ShiftPlan) -> StoreResult<()> {
            Err(StoreError::Corrupt("disk on fire".into()))
        }
        fn linked_records(&self) -> StoreResult<Vec<BlockRecord>> {
            self.0.linked_records()
        }
        fn record_count(&self) -> StoreResult<usize> {
            self.0.record_count()
        }
    }

    #[test]
    fn store_failure_propagates_unchanged() {
        let mut organizer = Organizer::new(FailingShift(MemoryStore::new()));
        organizer.add_root(h("R")).unwrap();
        organizer.ingest(h("B1"), h("R")).unwrap();
        organizer.organize().unwrap();
        organizer.ingest(h("B2"), h("R")).unwrap();

        let err = organizer.organize().unwrap_err();
        assert!(matches!(err, OrganizeError::Store(StoreError::Corrupt(_))));
        let root = organizer.store().find_by_hash(&h("R")).unwrap().unwrap();
        assert_eq!(root.interval(), Some(ChainInterval::single(0)));
    }
}
