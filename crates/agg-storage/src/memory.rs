//! In-memory ordered pool

use crate::error::{PoolError, PoolResult};
use crate::traits::OrderedPool;
use agg_primitives::{Address, Nonce};
use agg_types::{OperationRecord, RecordKey};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

/// Pool state behind the lock
struct PoolInner {
    /// Next serial to hand out
    next_id: u64,
    /// Records by serial (insertion order)
    by_id: BTreeMap<u64, OperationRecord>,
    /// Serial by (account, nonce); ordered so one account's nonces are adjacent
    by_key: BTreeMap<RecordKey, u64>,
}

impl PoolInner {
    fn account_range(
        &self,
        account: &Address,
        after: Bound<Nonce>,
    ) -> impl DoubleEndedIterator<Item = (&RecordKey, &u64)> + '_ {
        let start = match after {
            Bound::Excluded(nonce) => Bound::Excluded(RecordKey::new(*account, nonce)),
            _ => Bound::Included(RecordKey::new(*account, 0)),
        };
        let end = Bound::Included(RecordKey::new(*account, Nonce::MAX));
        self.by_key.range((start, end))
    }

    fn collect(&self, ids: impl Iterator<Item = u64>, limit: usize) -> Vec<OperationRecord> {
        ids.take(limit)
            .filter_map(|id| self.by_id.get(&id).cloned())
            .collect()
    }
}

/// Ordered pool held entirely in memory.
///
/// Serials start at 1.
pub struct MemoryPool {
    inner: RwLock<PoolInner>,
}

impl MemoryPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PoolInner {
                next_id: 1,
                by_id: BTreeMap::new(),
                by_key: BTreeMap::new(),
            }),
        }
    }

    /// All records, ascending by serial
    pub fn snapshot(&self) -> Vec<OperationRecord> {
        self.inner.read().by_id.values().cloned().collect()
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedPool for MemoryPool {
    fn add(&self, records: Vec<OperationRecord>) -> PoolResult<Vec<OperationRecord>> {
        let mut inner = self.inner.write();

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            let key = record.key();
            if inner.by_key.contains_key(&key) || !seen.insert(key) {
                return Err(PoolError::DuplicateKey(key));
            }
        }

        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let id = inner.next_id;
            inner.next_id += 1;
            let record = record.with_id(id);
            inner.by_key.insert(record.key(), id);
            inner.by_id.insert(id, record.clone());
            stored.push(record);
        }
        Ok(stored)
    }

    fn remove(&self, records: &[OperationRecord]) -> PoolResult<()> {
        let mut inner = self.inner.write();

        let mut ids = Vec::with_capacity(records.len());
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            let key = record.key();
            let id = inner.by_key.get(&key).copied();
            match id {
                Some(id) if !seen.contains(&key) => {
                    seen.insert(key);
                    ids.push((key, id));
                }
                _ => return Err(PoolError::NotFound(key)),
            }
        }

        for (key, id) in ids {
            inner.by_key.remove(&key);
            inner.by_id.remove(&id);
        }
        Ok(())
    }

    fn find(&self, account: &Address, nonce: Nonce) -> PoolResult<Option<OperationRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .by_key
            .get(&RecordKey::new(*account, nonce))
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    fn find_after(
        &self,
        account: &Address,
        nonce: Nonce,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>> {
        let inner = self.inner.read();
        let ids = inner
            .account_range(account, Bound::Excluded(nonce))
            .map(|(_, id)| *id);
        Ok(inner.collect(ids, limit))
    }

    fn by_account_in_nonce_order(
        &self,
        account: &Address,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>> {
        let inner = self.inner.read();
        let ids = inner
            .account_range(account, Bound::Unbounded)
            .map(|(_, id)| *id);
        Ok(inner.collect(ids, limit))
    }

    fn next_nonce_of(&self, account: &Address) -> PoolResult<Option<Nonce>> {
        let inner = self.inner.read();
        let next = inner
            .account_range(account, Bound::Unbounded)
            .next_back()
            .map(|(key, _)| key.nonce.saturating_add(1));
        Ok(next)
    }

    fn count(&self) -> PoolResult<usize> {
        Ok(self.inner.read().by_id.len())
    }

    fn first(&self) -> PoolResult<Option<OperationRecord>> {
        Ok(self.inner.read().by_id.values().next().cloned())
    }

    fn oldest(&self, limit: usize) -> PoolResult<Vec<OperationRecord>> {
        Ok(self
            .inner
            .read()
            .by_id
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    fn clear_before_id(&self, id: u64) -> PoolResult<usize> {
        let mut inner = self.inner.write();
        let kept = inner.by_id.split_off(&id);
        let cleared = std::mem::replace(&mut inner.by_id, kept);
        for record in cleared.values() {
            inner.by_key.remove(&record.key());
        }
        Ok(cleared.len())
    }
}
