//! # ForestDb: Persistent Record Store
//!
//! The on-disk [`RecordStore`], built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree         | Key               | Value                 |
//! |--------------|-------------------|-----------------------|
//! | `records`    | `id` (8B BE)      | `bincode(BlockRecord)`|
//! | `hash_index` | `hash` (32B)      | `id` (8B BE)          |
//! | `metadata`   | key (UTF-8)       | value (bytes)         |
//!
//! Ids are stored big-endian so that sled's lexicographic ordering matches
//! arrival order, which makes "pending records by id" a plain forward scan.
//!
//! ## Atomicity
//!
//! - Creating a record touches all three trees (record, hash index, id
//!   counter) and runs as one multi-tree sled transaction.
//! - An interval shift rewrites every record the plan moves through a
//!   single `Batch` on the `records` tree. sled applies a batch atomically,
//!   so readers and crash recovery see either the old forest or the new
//!   one, never a mix.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Batch, Db, IVec, Transactional, Tree};

use super::{
    next_root_chain_id, BlockHash, BlockId, BlockRecord, ChainInterval, Linkage, RecordStore,
    StoreError, StoreResult,
};
use crate::config::{HASH_INDEX_TREE, META_NEXT_ID, METADATA_TREE, RECORDS_TREE, ROOT_DEPTH};
use crate::forest::ShiftPlan;

type TxResult<T> = Result<T, ConflictableTransactionError<StoreError>>;

/// Persistent block record store.
///
/// Cloning is cheap: all clones share the same sled handles.
#[derive(Debug, Clone)]
pub struct ForestDb {
    db: Db,
    records: Tree,
    hash_index: Tree,
    metadata: Tree,
}

impl ForestDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a database that is removed when the last handle is dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        let hash_index = db.open_tree(HASH_INDEX_TREE)?;
        let metadata = db.open_tree(METADATA_TREE)?;

        Ok(Self {
            db,
            records,
            hash_index,
            metadata,
        })
    }

    /// Block until every write so far is durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn get(&self, id: BlockId) -> StoreResult<Option<BlockRecord>> {
        self.records
            .get(id.to_key())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Decode every stored record in id order.
    fn scan(&self) -> impl Iterator<Item = StoreResult<BlockRecord>> + '_ {
        self.records
            .iter()
            .values()
            .map(|value| decode(&value?))
    }

    fn put(&self, record: &BlockRecord) -> StoreResult<()> {
        self.records.insert(record.id.to_key(), encode(record)?)?;
        Ok(())
    }

    /// Insert a new record, or return the id already stored for `hash`.
    ///
    /// `linkage` is applied to a freshly inserted record and, when
    /// `link_existing` is set, to an existing record that is still pending.
    fn insert_or_get(
        &self,
        hash: BlockHash,
        prev_hash: BlockHash,
        linkage: Option<Linkage>,
        link_existing: bool,
    ) -> StoreResult<BlockId> {
        let result = (&self.records, &self.hash_index, &self.metadata).transaction(
            |(records, index, meta)| -> TxResult<BlockId> {
                if let Some(existing) = index.get(hash.as_bytes())? {
                    let id = BlockId::from_key(&existing).ok_or_else(|| {
                        abort(StoreError::Corrupt(format!("bad id for hash {hash}")))
                    })?;
                    if link_existing {
                        link_if_pending(records, id, linkage)?;
                    }
                    return Ok(id);
                }

                let id = match meta.get(META_NEXT_ID)? {
                    Some(bytes) => BlockId::from_key(&bytes)
                        .ok_or_else(|| abort(StoreError::Corrupt("bad id counter".into())))?,
                    None => BlockId(1),
                };
                let record = BlockRecord {
                    id,
                    hash,
                    prev_hash,
                    linkage,
                };
                records.insert(&id.to_key(), encode(&record).map_err(abort)?)?;
                index.insert(hash.as_bytes(), &id.to_key())?;
                meta.insert(META_NEXT_ID, &id.next().to_key())?;
                Ok(id)
            },
        );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        })
    }
}

fn abort(e: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(e)
}

fn encode(record: &BlockRecord) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

fn decode(bytes: &IVec) -> StoreResult<BlockRecord> {
    Ok(bincode::deserialize(bytes)?)
}

fn link_if_pending(
    records: &TransactionalTree,
    id: BlockId,
    linkage: Option<Linkage>,
) -> TxResult<()> {
    let bytes = records
        .get(id.to_key())?
        .ok_or_else(|| abort(StoreError::Corrupt(format!("hash index points at missing {id}"))))?;
    let mut record = decode(&bytes).map_err(abort)?;
    if record.linkage.is_none() {
        record.linkage = linkage;
        records.insert(&id.to_key(), encode(&record).map_err(abort)?)?;
    }
    Ok(())
}

impl RecordStore for ForestDb {
    fn create_pending(&mut self, hash: BlockHash, prev_hash: BlockHash) -> StoreResult<BlockId> {
        self.insert_or_get(hash, prev_hash, None, false)
    }

    fn create_root(&mut self, hash: BlockHash) -> StoreResult<BlockId> {
        let linked = self.linked_records()?;
        let chain_id = next_root_chain_id(linked.iter().filter_map(|r| r.linkage.as_ref()));
        let linkage = Linkage::new(ROOT_DEPTH, ChainInterval::single(chain_id));
        self.insert_or_get(hash, BlockHash::ZERO, Some(linkage), true)
    }

    fn find_by_hash(&self, hash: &BlockHash) -> StoreResult<Option<BlockRecord>> {
        let Some(key) = self.hash_index.get(hash.as_bytes())? else {
            return Ok(None);
        };
        let id = BlockId::from_key(&key)
            .ok_or_else(|| StoreError::Corrupt(format!("bad id for hash {hash}")))?;
        self.get(id)
    }

    fn list_pending_ordered_by_id(&self) -> StoreResult<Vec<BlockRecord>> {
        let mut pending = Vec::new();
        for record in self.scan() {
            let record = record?;
            if !record.is_linked() {
                pending.push(record);
            }
        }
        Ok(pending)
    }

    fn has_descendant_with_greater_depth(
        &self,
        interval: &ChainInterval,
        depth: u64,
    ) -> StoreResult<bool> {
        for record in self.scan() {
            if let Some(linkage) = record?.linkage {
                if linkage.depth > depth && interval.contains(&linkage.interval) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn slot_in_use(&self, chain_id: u64, depth: u64) -> StoreResult<bool> {
        let slot = ChainInterval::single(chain_id);
        for record in self.scan() {
            if let Some(linkage) = record?.linkage {
                if linkage.depth > depth && linkage.interval.contains(&slot) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn set_linked(&mut self, id: BlockId, linkage: Linkage) -> StoreResult<()> {
        let mut record = self.get(id)?.ok_or(StoreError::NotFound(id))?;
        if record.is_linked() {
            return Err(StoreError::AlreadyLinked(id));
        }
        record.linkage = Some(linkage);
        self.put(&record)
    }

    fn shift_intervals(&mut self, plan: &ShiftPlan) -> StoreResult<()> {
        let mut batch = Batch::default();
        let mut moved = 0usize;
        for record in self.scan() {
            let mut record = record?;
            let Some(linkage) = record.linkage.as_mut() else {
                continue;
            };
            if !plan.moves(linkage) {
                continue;
            }
            linkage.interval = plan.apply(linkage);
            batch.insert(&record.id.to_key(), encode(&record)?);
            moved += 1;
        }

        self.records.apply_batch(batch)?;
        tracing::trace!(slot = plan.slot(), moved, "interval shift applied");
        Ok(())
    }

    fn linked_records(&self) -> StoreResult<Vec<BlockRecord>> {
        let mut linked = Vec::new();
        for record in self.scan() {
            let record = record?;
            if record.is_linked() {
                linked.push(record);
            }
        }
        Ok(linked)
    }

    fn record_count(&self) -> StoreResult<usize> {
        Ok(self.records.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
