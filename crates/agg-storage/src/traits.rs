//! Ordered pool contract

use crate::error::PoolResult;
use agg_primitives::{Address, Nonce};
use agg_types::OperationRecord;

/// Ordered storage of operation records with per-account nonce queries.
///
/// Each call is atomic on its own; nothing spans two calls or two pools.
/// Serials handed out by [`add`](OrderedPool::add) strictly increase for the
/// lifetime of the pool and are never reused.
pub trait OrderedPool: Send + Sync {
    /// Insert records, assigning each a fresh serial.
    ///
    /// Fails with `DuplicateKey` without inserting anything if any
    /// (account, nonce) is already stored or repeats within `records`.
    /// Returns the records as stored.
    fn add(&self, records: Vec<OperationRecord>) -> PoolResult<Vec<OperationRecord>>;

    /// Delete records by (account, nonce).
    ///
    /// Fails with `NotFound` without deleting anything if any target is
    /// missing.
    fn remove(&self, records: &[OperationRecord]) -> PoolResult<()>;

    /// Look up the record stored at (account, nonce)
    fn find(&self, account: &Address, nonce: Nonce) -> PoolResult<Option<OperationRecord>>;

    /// Up to `limit` records of `account` with nonce strictly greater than
    /// `nonce`, ascending by nonce
    fn find_after(
        &self,
        account: &Address,
        nonce: Nonce,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>>;

    /// Up to `limit` records of `account`, ascending by nonce
    fn by_account_in_nonce_order(
        &self,
        account: &Address,
        limit: usize,
    ) -> PoolResult<Vec<OperationRecord>>;

    /// Highest stored nonce of `account` plus one, `None` if it has no records.
    ///
    /// Saturates at `Nonce::MAX`; the admission engine never stores that nonce.
    fn next_nonce_of(&self, account: &Address) -> PoolResult<Option<Nonce>>;

    /// Total number of stored records
    fn count(&self) -> PoolResult<usize>;

    /// Record with the lowest serial
    fn first(&self) -> PoolResult<Option<OperationRecord>>;

    /// Up to `limit` records ascending by serial, across all accounts
    fn oldest(&self, limit: usize) -> PoolResult<Vec<OperationRecord>>;

    /// Delete every record with serial below `id`; returns how many went
    fn clear_before_id(&self, id: u64) -> PoolResult<usize>;

    /// Check if the pool holds no records
    fn is_empty(&self) -> PoolResult<bool> {
        Ok(self.count()? == 0)
    }
}
