//! In-memory [`RecordStore`] for tests and for embedding the organizer in
//! processes that keep their own persistence.

use std::collections::{BTreeMap, HashMap};

use super::{
    next_root_chain_id, BlockHash, BlockId, BlockRecord, ChainInterval, Linkage, RecordStore,
    StoreError, StoreResult,
};
use crate::config::ROOT_DEPTH;
use crate::forest::ShiftPlan;

/// Records keyed by id, plus a hash index.
///
/// Ids start at 1 and increase by one per stored record.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: BTreeMap<BlockId, BlockRecord>,
    by_hash: HashMap<BlockHash, BlockId>,
    next_id: BlockId,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            by_hash: HashMap::new(),
            next_id: BlockId(1),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockRecord> {
        self.records.get(&id)
    }

    fn insert(&mut self, hash: BlockHash, prev_hash: BlockHash, linkage: Option<Linkage>) -> BlockId {
        let id = self.next_id;
        self.next_id = id.next();
        self.records.insert(
            id,
            BlockRecord {
                id,
                hash,
                prev_hash,
                linkage,
            },
        );
        self.by_hash.insert(hash, id);
        id
    }

    fn root_linkage(&self) -> Linkage {
        let chain_id = next_root_chain_id(self.records.values().filter_map(|r| r.linkage.as_ref()));
        Linkage::new(ROOT_DEPTH, ChainInterval::single(chain_id))
    }
}

impl RecordStore for MemoryStore {
    fn create_pending(&mut self, hash: BlockHash, prev_hash: BlockHash) -> StoreResult<BlockId> {
        if let Some(id) = self.by_hash.get(&hash) {
            return Ok(*id);
        }
        Ok(self.insert(hash, prev_hash, None))
    }

    fn create_root(&mut self, hash: BlockHash) -> StoreResult<BlockId> {
        let linkage = self.root_linkage();
        match self.by_hash.get(&hash).copied() {
            Some(id) => {
                let record = self
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::Corrupt(format!("hash index points at missing {id}")))?;
                if record.linkage.is_none() {
                    record.linkage = Some(linkage);
                }
                Ok(id)
            }
            None => Ok(self.insert(hash, BlockHash::ZERO, Some(linkage))),
        }
    }

    fn find_by_hash(&self, hash: &BlockHash) -> StoreResult<Option<BlockRecord>> {
        Ok(self
            .by_hash
            .get(hash)
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn list_pending_ordered_by_id(&self) -> StoreResult<Vec<BlockRecord>> {
        Ok(self
            .records
            .values()
            .filter(|r| !r.is_linked())
            .cloned()
            .collect())
    }

    fn has_descendant_with_greater_depth(
        &self,
        interval: &ChainInterval,
        depth: u64,
    ) -> StoreResult<bool> {
        Ok(self
            .records
            .values()
            .filter_map(|r| r.linkage.as_ref())
            .any(|l| l.depth > depth && interval.contains(&l.interval)))
    }

    fn slot_in_use(&self, chain_id: u64, depth: u64) -> StoreResult<bool> {
        let slot = ChainInterval::single(chain_id);
        Ok(self
            .records
            .values()
            .filter_map(|r| r.linkage.as_ref())
            .any(|l| l.depth > depth && l.interval.contains(&slot)))
    }

    fn set_linked(&mut self, id: BlockId, linkage: Linkage) -> StoreResult<()> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.is_linked() {
            return Err(StoreError::AlreadyLinked(id));
        }
        record.linkage = Some(linkage);
        Ok(())
    }

    fn shift_intervals(&mut self, plan: &ShiftPlan) -> StoreResult<()> {
        // Work out every new interval before writing any of them.
        let moved: Vec<(BlockId, ChainInterval)> = self
            .records
            .values()
            .filter_map(|r| r.linkage.as_ref().map(|l| (r.id, l)))
            .filter(|(_, l)| plan.moves(l))
            .map(|(id, l)| (id, plan.apply(l)))
            .collect();

        for (id, interval) in moved {
            if let Some(linkage) = self.records.get_mut(&id).and_then(|r| r.linkage.as_mut()) {
                linkage.interval = interval;
            }
        }
        Ok(())
    }

    fn linked_records(&self) -> StoreResult<Vec<BlockRecord>> {
        Ok(self
            .records
            .values()
            .filter(|r| r.is_linked())
            .cloned()
            .collect())
    }

    fn record_count(&self) -> StoreResult<usize> {
        Ok(self.records.len())
    }
}
