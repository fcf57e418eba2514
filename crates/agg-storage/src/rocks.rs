//! RocksDB-backed ordered pool

use crate::db::{cf, Database};
use crate::error::{PoolError, PoolResult, StorageError, StorageResult};
use crate::traits::OrderedPool;
use agg_primitives::{Address, Nonce};
use agg_types::codec::{decode_key, decode_record, encode_key, encode_record};
use agg_types::{OperationRecord, RecordKey};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Which pool a [`RocksPool`] stores
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolTable {
    /// Operations eligible for aggregation
    Ready,
    /// Operations waiting for a nonce gap to close
    Future,
}

impl PoolTable {
    fn records_cf(self) -> &'static str {
        match self {
            PoolTable::Ready => cf::READY_RECORDS,
            PoolTable::Future => cf::FUTURE_RECORDS,
        }
    }

    fn index_cf(self) -> &'static str {
        match self {
            PoolTable::Ready => cf::READY_INDEX,
            PoolTable::Future => cf::FUTURE_INDEX,
        }
    }

    fn meta_key(self) -> &'static [u8] {
        match self {
            PoolTable::Ready => b"ready_next_id",
            PoolTable::Future => b"future_next_id",
        }
    }
}

/// Ordered pool persisted in two column families.
///
/// `<table>_records` maps the big-endian serial to the encoded record, so
/// iteration order is serial order. `<table>_index` maps `account || nonce`
/// to the serial, so one account's nonces are a contiguous key range.
/// Writes go through one mutex so that duplicate checks and serial
/// assignment see a stable view.
pub struct RocksPool {
    db: Database,
    table: PoolTable,
    next_id: AtomicU64,
    count: AtomicUsize,
    write_lock: Mutex<()>,
}

impl RocksPool {
    /// Attach to `table` inside an open database, restoring the serial
    /// counter and record count from what is already stored.
    pub fn open(db: Database, table: PoolTable) -> StorageResult<Self> {
        let stored_next = match db.get(cf::META, table.meta_key())? {
            Some(bytes) => decode_u64(&bytes)?,
            None => 1,
        };
        let after_last = match db.last(table.records_cf())? {
            Some((key, _)) => decode_u64(&key)? + 1,
            None => 1,
        };
        let count = db.count_keys(table.index_cf())?;

        tracing::debug!(
            "Opened {:?} pool table: {} records, next id {}",
            table,
            count,
            stored_next.max(after_last)
        );

        Ok(Self {
            db,
            table,
            next_id: AtomicU64::new(stored_next.max(after_last)),
            count: AtomicUsize::new(count),
            write_lock: Mutex::new(()),
        })
    }

    /// Table this pool stores
    pub fn table(&self) -> PoolTable {
        self.table
    }

    fn load(&self, id_bytes: &[u8]) -> StorageResult<OperationRecord> {
        let bytes = self
            .db
            .get(self.table.records_cf(), id_bytes)?
            .ok_or_else(|| StorageError::InvalidFormat("index points at missing record".into()))?;
        decode_record(&bytes)
            .ok_or_else(|| StorageError::InvalidFormat("undecodable operation record".into()))
    }

    fn serial_of(&self, key: &RecordKey) -> StorageResult<Option<Vec<u8>>> {
        self.db.get(self.table.index_cf(), &encode_key(key))
    }

    /// Records of `account` from `start` upwards, following the index
    fn account_scan(
        &self,
        account: &Address,
        start: Nonce,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>> {
        let from = encode_key(&RecordKey::new(*account, start));
        let entries = self.db.scan_forward(self.table.index_cf(), Some(&from), limit, |key| {
            key.starts_with(account.as_bytes())
        })?;
        let records = entries
            .iter()
            .map(|(_, id)| self.load(id))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Records in serial order while `keep` accepts the serial
    fn serial_scan(
        &self,
        limit: usize,
        mut keep: impl FnMut(u64) -> bool,
    ) -> PoolResult<Vec<OperationRecord>> {
        let entries = self
            .db
            .scan_forward(self.table.records_cf(), None, limit, |key| {
                decode_u64(key).map(&mut keep).unwrap_or(false)
            })?;
        let records = entries
            .iter()
            .map(|(_, bytes)| {
                decode_record(bytes)
                    .ok_or_else(|| StorageError::InvalidFormat("undecodable operation record".into()))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(records)
    }
}

impl OrderedPool for RocksPool {
    fn add(&self, records: Vec<OperationRecord>) -> PoolResult<Vec<OperationRecord>> {
        let _guard = self.write_lock.lock();

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            let key = record.key();
            if !seen.insert(key) || self.serial_of(&key)?.is_some() {
                return Err(PoolError::DuplicateKey(key));
            }
        }

        let mut next_id = self.next_id.load(Ordering::SeqCst);
        let mut batch = self.db.batch();
        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let record = record.with_id(next_id);
            let encoded = encode_record(&record)
                .ok_or_else(|| StorageError::InvalidFormat(format!("unencodable record {}", record.key())))?;
            batch.put(self.table.records_cf(), &next_id.to_be_bytes(), &encoded);
            batch.put(self.table.index_cf(), &encode_key(&record.key()), &next_id.to_be_bytes());
            stored.push(record);
            next_id += 1;
        }
        batch.put(cf::META, self.table.meta_key(), &next_id.to_be_bytes());
        self.db.write_batch(batch)?;

        self.next_id.store(next_id, Ordering::SeqCst);
        self.count.fetch_add(stored.len(), Ordering::SeqCst);
        Ok(stored)
    }

    fn remove(&self, records: &[OperationRecord]) -> PoolResult<()> {
        let _guard = self.write_lock.lock();

        let mut seen = HashSet::with_capacity(records.len());
        let mut batch = self.db.batch();
        for record in records {
            let key = record.key();
            let id = match self.serial_of(&key)? {
                Some(id) if seen.insert(key) => id,
                _ => return Err(PoolError::NotFound(key)),
            };
            batch.delete(self.table.index_cf(), &encode_key(&key));
            batch.delete(self.table.records_cf(), &id);
        }
        self.db.write_batch(batch)?;

        self.count.fetch_sub(seen.len(), Ordering::SeqCst);
        Ok(())
    }

    fn find(&self, account: &Address, nonce: Nonce) -> PoolResult<Option<OperationRecord>> {
        match self.serial_of(&RecordKey::new(*account, nonce))? {
            Some(id) => Ok(Some(self.load(&id)?)),
            None => Ok(None),
        }
    }

    fn find_after(
        &self,
        account: &Address,
        nonce: Nonce,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>> {
        match nonce.checked_add(1) {
            Some(start) => self.account_scan(account, start, limit),
            None => Ok(Vec::new()),
        }
    }

    fn by_account_in_nonce_order(
        &self,
        account: &Address,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>> {
        self.account_scan(account, 0, limit)
    }

    fn next_nonce_of(&self, account: &Address) -> PoolResult<Option<Nonce>> {
        let ceiling = encode_key(&RecordKey::new(*account, Nonce::MAX));
        let Some((key, _)) = self.db.seek_last(self.table.index_cf(), &ceiling)? else {
            return Ok(None);
        };
        Ok(decode_key(&key)
            .filter(|key| key.account == *account)
            .map(|key| key.nonce.saturating_add(1)))
    }

    fn count(&self) -> PoolResult<usize> {
        Ok(self.count.load(Ordering::SeqCst))
    }

    fn first(&self) -> PoolResult<Option<OperationRecord>> {
        Ok(self.serial_scan(1, |_| true)?.into_iter().next())
    }

    fn oldest(&self, limit: usize) -> PoolResult<Vec<OperationRecord>> {
        self.serial_scan(limit, |_| true)
    }

    fn clear_before_id(&self, id: u64) -> PoolResult<usize> {
        let _guard = self.write_lock.lock();

        let doomed = self.serial_scan(usize::MAX, |serial| serial < id)?;
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut batch = self.db.batch();
        for record in &doomed {
            if let Some(serial) = record.id {
                batch.delete(self.table.records_cf(), &serial.to_be_bytes());
            }
            batch.delete(self.table.index_cf(), &encode_key(&record.key()));
        }
        self.db.write_batch(batch)?;

        self.count.fetch_sub(doomed.len(), Ordering::SeqCst);
        Ok(doomed.len())
    }
}

fn decode_u64(bytes: &[u8]) -> StorageResult<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidFormat(format!("expected 8-byte serial, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agg_primitives::U256;
    use tempfile::TempDir;

    fn open_pools() -> (RocksPool, RocksPool, Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        let ready = RocksPool::open(db.clone(), PoolTable::Ready).unwrap();
        let future = RocksPool::open(db.clone(), PoolTable::Future).unwrap();
        (ready, future, db, dir)
    }

    fn op(who: u8, nonce: Nonce) -> OperationRecord {
        OperationRecord::new(
            Address::from_bytes([who; 20]),
            nonce,
            U256::from(7u64),
            vec![who; 4],
        )
    }

    #[test]
    fn test_tables_are_isolated() {
        let (ready, future, _db, _dir) = open_pools();
        ready.add(vec![op(1, 0)]).unwrap();
        future.add(vec![op(1, 0)]).unwrap();

        assert_eq!(ready.count().unwrap(), 1);
        assert_eq!(future.count().unwrap(), 1);
        ready.remove(&[op(1, 0)]).unwrap();
        assert!(future.find(&Address::from_bytes([1; 20]), 0).unwrap().is_some());
    }

    #[test]
    fn test_reopen_restores_serial_and_count() {
        let dir = TempDir::new().unwrap();
        {
            let db = Database::new(dir.path());
            db.open().unwrap();
            let pool = RocksPool::open(db.clone(), PoolTable::Future).unwrap();
            pool.add(vec![op(1, 3), op(1, 4)]).unwrap();
            pool.remove(&[op(1, 4)]).unwrap();
            db.close();
        }

        let db = Database::new(dir.path());
        db.open().unwrap();
        let pool = RocksPool::open(db, PoolTable::Future).unwrap();
        assert_eq!(pool.count().unwrap(), 1);
        let stored = pool.add(vec![op(2, 0)]).unwrap();
        assert_eq!(stored[0].id, Some(3));
    }

    #[test]
    fn test_next_nonce_ignores_following_account() {
        let (ready, _future, _db, _dir) = open_pools();
        ready.add(vec![op(2, 0), op(2, 1)]).unwrap();

        assert_eq!(ready.next_nonce_of(&Address::from_bytes([1; 20])).unwrap(), None);
        assert_eq!(ready.next_nonce_of(&Address::from_bytes([2; 20])).unwrap(), Some(2));
        assert_eq!(ready.next_nonce_of(&Address::from_bytes([3; 20])).unwrap(), None);
    }

    #[test]
    fn test_failed_remove_leaves_pool_untouched() {
        let (ready, _future, _db, _dir) = open_pools();
        ready.add(vec![op(1, 0)]).unwrap();

        let result = ready.remove(&[op(1, 0), op(1, 1)]);
        assert!(matches!(result, Err(PoolError::NotFound(_))));
        assert_eq!(ready.count().unwrap(), 1);
    }
}
