//! # Chain Interval Allocator
//!
//! When a second branch has to hang off a parent that already has a child,
//! the forest needs a chain id that sits inside the parent's interval (and
//! every ancestor's) but inside nobody else's. The allocator makes one by
//! opening a gap directly after the parent's right bound:
//!
//! ```text
//! before:  R (0,0) ── A (0,0)          X (1,1)
//!
//! plan:    slot = R.right + 1 = 1
//!          left  >= 1  → left  + 1     X: (2, _)
//!          right >= 1  → right + 1     X: (_, 2)
//!          R and its ancestors ending at R.right → right + 1
//!
//! after:   R (0,1) ── A (0,0)          X (2,2)
//!                  └─ slot 1 is free, inside R only
//! ```
//!
//! The allocator is pure: [`ShiftPlan::apply`] maps one record's linkage to
//! its renumbered interval. Stores run it over every linked record inside
//! a single atomic write, so nobody ever observes a half-shifted forest.
//! The freed slot is not assigned here; the pending block claims it on its
//! next linking attempt.

use crate::storage::{ChainInterval, Linkage};

/// Renumbering that frees one chain id directly after a parent's interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftPlan {
    slot: u64,
    parent: Linkage,
}

impl ShiftPlan {
    /// Plan a new branch slot below `parent`.
    pub fn for_parent(parent: &Linkage) -> Self {
        Self {
            slot: parent.interval.right + 1,
            parent: *parent,
        }
    }

    /// The chain id left vacant once the plan is applied.
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// The parent's interval after the plan is applied.
    pub fn widened_parent(&self) -> ChainInterval {
        ChainInterval::new(self.parent.interval.left, self.slot)
    }

    /// True for the parent itself and every ancestor whose right bound
    /// coincides with the parent's. Those are widened over the new slot.
    ///
    /// Containing the parent's interval at a depth no greater than the
    /// parent's only happens for the parent and its ancestors: siblings are
    /// disjoint and descendants are deeper.
    fn widens(&self, linkage: &Linkage) -> bool {
        let parent = &self.parent;
        linkage.interval.right == parent.interval.right
            && linkage.interval.left <= parent.interval.left
            && linkage.depth <= parent.depth
    }

    /// Renumber one linked record.
    pub fn apply(&self, linkage: &Linkage) -> ChainInterval {
        let ChainInterval { mut left, mut right } = linkage.interval;
        if left >= self.slot {
            left += 1;
        }
        if right >= self.slot || self.widens(linkage) {
            right += 1;
        }
        ChainInterval::new(left, right)
    }

    /// Whether [`apply`](Self::apply) changes this record at all.
    pub fn moves(&self, linkage: &Linkage) -> bool {
        self.apply(linkage) != linkage.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(depth: u64, left: u64, right: u64) -> Linkage {
        Linkage::new(depth, ChainInterval::new(left, right))
    }

    #[test]
    fn fork_at_root_widens_root_only() {
        let root = link(0, 0, 0);
        let child = link(1, 0, 0);
        let plan = ShiftPlan::for_parent(&root);

        assert_eq!(plan.slot(), 1);
        assert_eq!(plan.apply(&root), ChainInterval::new(0, 1));
        assert_eq!(plan.apply(&child), ChainInterval::new(0, 0));
        assert!(!plan.moves(&child));
        assert_eq!(plan.widened_parent(), ChainInterval::new(0, 1));
    }

    #[test]
    fn records_right_of_slot_shift_both_bounds() {
        // R (0,1) with branches A (0,0) and B (1,1). Fork below A.
        let a = link(1, 0, 0);
        let b = link(1, 1, 1);
        let root = link(0, 0, 1);
        let plan = ShiftPlan::for_parent(&a);

        assert_eq!(plan.slot(), 1);
        assert_eq!(plan.apply(&b), ChainInterval::new(2, 2));
        assert_eq!(plan.apply(&root), ChainInterval::new(0, 2));
        assert_eq!(plan.apply(&a), ChainInterval::new(0, 1));
    }

    #[test]
    fn ancestors_sharing_right_bound_are_widened() {
        // Unforked chain R - A - P with child C, all on chain id 0.
        let r = link(0, 0, 0);
        let a = link(1, 0, 0);
        let p = link(2, 0, 0);
        let c = link(3, 0, 0);
        let plan = ShiftPlan::for_parent(&p);

        assert_eq!(plan.apply(&r), ChainInterval::new(0, 1));
        assert_eq!(plan.apply(&a), ChainInterval::new(0, 1));
        assert_eq!(plan.apply(&p), ChainInterval::new(0, 1));
        assert_eq!(plan.apply(&c), ChainInterval::new(0, 0));
    }

    #[test]
    fn slot_is_contained_only_by_parent_and_ancestors() {
        // R (0,2): A (0,0) -> A1 (0,0), B (1,1), C (2,2). Fork below B.
        let records = [
            ("r", link(0, 0, 2)),
            ("a", link(1, 0, 0)),
            ("a1", link(2, 0, 0)),
            ("b", link(1, 1, 1)),
            ("c", link(1, 2, 2)),
        ];
        let plan = ShiftPlan::for_parent(&records[3].1);
        let slot = ChainInterval::single(plan.slot());

        let holders: Vec<&str> = records
            .iter()
            .filter(|(_, l)| plan.apply(l).contains(&slot))
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(holders, vec!["r", "b"]);
        assert_eq!(plan.apply(&records[4].1), ChainInterval::new(3, 3));
    }

    #[test]
    fn containment_survives_the_shift() {
        let root = link(0, 0, 1);
        let left = link(1, 0, 0);
        let right = link(1, 1, 1);
        let plan = ShiftPlan::for_parent(&left);

        let root_after = plan.apply(&root);
        assert!(root_after.contains(&plan.apply(&left)));
        assert!(root_after.contains(&plan.apply(&right)));
        assert!(!plan.apply(&left).overlaps(&plan.apply(&right)));
    }
}
