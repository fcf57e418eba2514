//! Storage error types

use agg_types::RecordKey;
use thiserror::Error;

/// Low-level database errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// RocksDB error
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Invalid column family
    #[error("invalid column family: {0}")]
    InvalidColumnFamily(String),

    /// Database not open
    #[error("database not open")]
    NotOpen,

    /// Database already open
    #[error("database already open")]
    AlreadyOpen,

    /// Stored bytes could not be decoded
    #[error("invalid data format: {0}")]
    InvalidFormat(String),
}

/// Result type for database operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by an ordered pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// A record with this (account, nonce) is already stored
    #[error("duplicate key: {0}")]
    DuplicateKey(RecordKey),

    /// Removal target is not stored
    #[error("record not found: {0}")]
    NotFound(RecordKey),

    /// Backend failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
