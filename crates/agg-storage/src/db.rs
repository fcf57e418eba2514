//! RocksDB wrapper

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use std::path::Path;
use std::sync::Arc;

/// Column family names
pub mod cf {
    /// Ready records by serial
    pub const READY_RECORDS: &str = "ready_records";
    /// Ready serials by (account, nonce)
    pub const READY_INDEX: &str = "ready_index";
    /// Future records by serial
    pub const FUTURE_RECORDS: &str = "future_records";
    /// Future serials by (account, nonce)
    pub const FUTURE_INDEX: &str = "future_index";
    /// Serial counters
    pub const META: &str = "meta";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[
    cf::READY_RECORDS,
    cf::READY_INDEX,
    cf::FUTURE_RECORDS,
    cf::FUTURE_INDEX,
    cf::META,
];

type RocksDB = DBWithThreadMode<MultiThreaded>;

/// Database configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Create database if missing
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size
    pub write_buffer_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// RocksDB wrapper with column family support
pub struct Database {
    db: Arc<RwLock<Option<RocksDB>>>,
    path: String,
}

impl Database {
    /// Create a new database instance (not yet opened)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            db: Arc::new(RwLock::new(None)),
            path: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Open the database with default config
    pub fn open(&self) -> StorageResult<()> {
        self.open_with_config(DbConfig::default())
    }

    /// Open the database with custom config
    pub fn open_with_config(&self, config: DbConfig) -> StorageResult<()> {
        let mut db_guard = self.db.write();
        if db_guard.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = RocksDB::open_cf_descriptors(&opts, &self.path, cf_descriptors)?;
        *db_guard = Some(db);
        tracing::debug!("Opened pool database at {}", self.path);
        Ok(())
    }

    /// Close the database
    pub fn close(&self) {
        let mut db_guard = self.db.write();
        *db_guard = None;
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = self.get_cf(db, cf_name)?;
        Ok(db.get_cf(&cf, key)?)
    }

    /// Walk a column family forward from `start` (or its first key),
    /// collecting at most `limit` entries while `keep` accepts the key.
    pub fn scan_forward<F>(
        &self,
        cf_name: &str,
        start: Option<&[u8]>,
        limit: usize,
        mut keep: F,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = self.get_cf(db, cf_name)?;

        let mode = match start {
            Some(key) => IteratorMode::From(key, Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut entries = Vec::new();
        for item in db.iterator_cf(&cf, mode) {
            if entries.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !keep(&key) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    /// Entry with the greatest key `<= at`, if any
    pub fn seek_last(&self, cf_name: &str, at: &[u8]) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = self.get_cf(db, cf_name)?;

        let entry = db
            .iterator_cf(&cf, IteratorMode::From(at, Direction::Reverse))
            .next();
        match entry {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some((key.to_vec(), value.to_vec())))
            }
            None => Ok(None),
        }
    }

    /// Last entry of a column family, if any
    pub fn last(&self, cf_name: &str) -> StorageResult<Option<(Vec<u8>, Vec<u8>)>> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = self.get_cf(db, cf_name)?;

        let entry = db.iterator_cf(&cf, IteratorMode::End).next();
        match entry {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some((key.to_vec(), value.to_vec())))
            }
            None => Ok(None),
        }
    }

    /// Number of keys in a column family (full scan)
    pub fn count_keys(&self, cf_name: &str) -> StorageResult<usize> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = self.get_cf(db, cf_name)?;

        let mut count = 0;
        for item in db.iterator_cf(&cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Create a write batch
    pub fn batch(&self) -> WriteBatchWrapper {
        WriteBatchWrapper::new()
    }

    /// Execute a write batch atomically
    pub fn write_batch(&self, batch: WriteBatchWrapper) -> StorageResult<()> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;

        let mut rocks_batch = WriteBatch::default();
        for op in batch.operations {
            match op {
                BatchOp::Put { cf_name, key, value } => {
                    let cf = self.get_cf(db, cf_name)?;
                    rocks_batch.put_cf(&cf, &key, &value);
                }
                BatchOp::Delete { cf_name, key } => {
                    let cf = self.get_cf(db, cf_name)?;
                    rocks_batch.delete_cf(&cf, &key);
                }
            }
        }

        db.write(rocks_batch)?;
        Ok(())
    }

    /// Get column family handle
    fn get_cf<'a>(&self, db: &'a RocksDB, name: &str) -> StorageResult<Arc<BoundColumnFamily<'a>>> {
        db.cf_handle(name)
            .ok_or_else(|| StorageError::InvalidColumnFamily(name.to_string()))
    }

    /// Get database path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            path: self.path.clone(),
        }
    }
}

/// Batch operation
enum BatchOp {
    Put { cf_name: &'static str, key: Vec<u8>, value: Vec<u8> },
    Delete { cf_name: &'static str, key: Vec<u8> },
}

/// Write batch wrapper
pub struct WriteBatchWrapper {
    operations: Vec<BatchOp>,
}

impl WriteBatchWrapper {
    /// Create a new write batch
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Add a put operation
    pub fn put(&mut self, cf_name: &'static str, key: &[u8], value: &[u8]) {
        self.operations.push(BatchOp::Put {
            cf_name,
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Add a delete operation
    pub fn delete(&mut self, cf_name: &'static str, key: &[u8]) {
        self.operations.push(BatchOp::Delete {
            cf_name,
            key: key.to_vec(),
        });
    }

    /// Get number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for WriteBatchWrapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());
        db.open().unwrap();
        (db, dir)
    }

    #[test]
    fn test_open_close() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path());

        assert!(!db.is_open());
        db.open().unwrap();
        assert!(db.is_open());
        assert!(matches!(db.open(), Err(StorageError::AlreadyOpen)));
        db.close();
        assert!(!db.is_open());
    }

    #[test]
    fn test_not_open_error() {
        let db = Database::new("/tmp/agg_not_opened");
        assert!(matches!(db.get(cf::META, b"key"), Err(StorageError::NotOpen)));
        assert!(matches!(db.last(cf::META), Err(StorageError::NotOpen)));
    }

    #[test]
    fn test_write_batch_and_scan() {
        let (db, _dir) = open_temp();

        let mut batch = db.batch();
        batch.put(cf::READY_INDEX, b"a1", b"1");
        batch.put(cf::READY_INDEX, b"a2", b"2");
        batch.put(cf::READY_INDEX, b"b1", b"3");
        assert_eq!(batch.len(), 3);
        db.write_batch(batch).unwrap();

        let a = db
            .scan_forward(cf::READY_INDEX, Some(b"a"), 10, |k| k.starts_with(b"a"))
            .unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[1], (b"a2".to_vec(), b"2".to_vec()));

        let limited = db.scan_forward(cf::READY_INDEX, None, 1, |_| true).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(db.count_keys(cf::READY_INDEX).unwrap(), 3);
    }

    #[test]
    fn test_seek_last_and_last() {
        let (db, _dir) = open_temp();
        let mut batch = db.batch();
        batch.put(cf::FUTURE_INDEX, b"a1", b"1");
        batch.put(cf::FUTURE_INDEX, b"a5", b"2");
        batch.put(cf::FUTURE_INDEX, b"c1", b"3");
        db.write_batch(batch).unwrap();

        let (key, _) = db.seek_last(cf::FUTURE_INDEX, b"b").unwrap().unwrap();
        assert_eq!(key, b"a5".to_vec());
        assert!(db.seek_last(cf::FUTURE_INDEX, b"a0").unwrap().is_none());

        let (key, _) = db.last(cf::FUTURE_INDEX).unwrap().unwrap();
        assert_eq!(key, b"c1".to_vec());
        assert!(db.last(cf::READY_INDEX).unwrap().is_none());
    }

    #[test]
    fn test_batch_delete() {
        let (db, _dir) = open_temp();
        let mut batch = db.batch();
        batch.put(cf::META, b"k", b"v");
        db.write_batch(batch).unwrap();

        let mut batch = db.batch();
        batch.delete(cf::META, b"k");
        db.write_batch(batch).unwrap();
        assert!(db.get(cf::META, b"k").unwrap().is_none());
    }
}
