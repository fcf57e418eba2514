//! # agg-storage
//!
//! Ordered pool storage for the operation aggregator.
//!
//! This crate provides:
//! - The [`OrderedPool`] contract the admission engine is written against
//! - [`MemoryPool`], a lock-guarded in-memory backend
//! - [`RocksPool`], a RocksDB backend (one table per pool in a shared database)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod db;
mod error;
mod memory;
mod rocks;
mod traits;

pub use db::{cf, Database, DbConfig, WriteBatchWrapper, ALL_CFS};
pub use error::{PoolError, PoolResult, StorageError, StorageResult};
pub use memory::MemoryPool;
pub use rocks::{PoolTable, RocksPool};
pub use traits::OrderedPool;
