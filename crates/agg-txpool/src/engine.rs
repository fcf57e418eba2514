//! Admission engine

use crate::config::PoolConfig;
use crate::error::{ConfigError, RejectionReason};
use crate::metrics::PoolMetrics;
use crate::oracle::AccountStateOracle;
use agg_primitives::{Address, Nonce};
use agg_storage::{OrderedPool, PoolError};
use agg_types::OperationRecord;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Where an accepted operation ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Inserted into Ready; `promoted` Future records followed it
    Ready {
        /// Future records moved into Ready by the cascade
        promoted: usize,
    },
    /// Inserted into Future
    Queued {
        /// Records evicted to make room
        evicted: usize,
        /// Whether a record at the same nonce was replaced
        superseded: bool,
    },
    /// Replaced a Ready record with a better-paying one
    Replaced {
        /// Downstream Ready records re-inserted behind it
        reinserted: usize,
    },
}

/// Outcome of [`AdmissionEngine::confirm`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confirmation {
    /// Ready records at or below the confirmed nonce
    pub ready_removed: usize,
    /// Future records at or below the confirmed nonce
    pub future_removed: usize,
    /// Future records promoted from the new floor
    pub promoted: usize,
}

/// How a Future record relates to the promotion floor
enum FutureSlot {
    /// Below the floor; can never become Ready
    Stale,
    /// Exactly at the floor
    Next,
    /// Above the floor; promotion stops here
    Gap,
}

impl FutureSlot {
    fn classify(nonce: Nonce, floor: Nonce) -> Self {
        match nonce.cmp(&floor) {
            Ordering::Less => FutureSlot::Stale,
            Ordering::Equal => FutureSlot::Next,
            Ordering::Greater => FutureSlot::Gap,
        }
    }
}

/// Routes signed operations into the Ready and Future pools.
///
/// The engine holds no lock of its own. Two concurrent submissions for the
/// same account may race on the pools; wrap the engine in a
/// [`SerialSubmitter`](crate::SerialSubmitter) to serialize per account.
pub struct AdmissionEngine {
    config: PoolConfig,
    ready: Arc<dyn OrderedPool>,
    future: Arc<dyn OrderedPool>,
    oracle: Arc<dyn AccountStateOracle>,
    metrics: Arc<PoolMetrics>,
}

impl AdmissionEngine {
    /// Create an engine over the given pools and oracle
    pub fn new(
        config: PoolConfig,
        ready: Arc<dyn OrderedPool>,
        future: Arc<dyn OrderedPool>,
        oracle: Arc<dyn AccountStateOracle>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ready,
            future,
            oracle,
            metrics: Arc::new(PoolMetrics::new()),
        })
    }

    /// Get the engine configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Ready pool
    pub fn ready(&self) -> &Arc<dyn OrderedPool> {
        &self.ready
    }

    /// Future pool
    pub fn future(&self) -> &Arc<dyn OrderedPool> {
        &self.future
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Submit an operation. An empty list means it was accepted.
    pub async fn submit(&self, op: OperationRecord) -> Vec<RejectionReason> {
        self.admit(op).await.err().unwrap_or_default()
    }

    /// Submit an operation and report where it went
    pub async fn admit(&self, op: OperationRecord) -> Result<Admission, Vec<RejectionReason>> {
        let started = Instant::now();
        let key = op.key();
        let digest = op.digest();

        let result = match self.oracle.validate(&op).await {
            Ok(chain_next_nonce) => self.apply(op, chain_next_nonce).map_err(|r| vec![r]),
            Err(reasons) => Err(reasons),
        };
        self.metrics.record_submit(started.elapsed());

        match &result {
            Ok(admission) => {
                self.metrics.record_admission(admission);
                debug!("Admitted {} ({}): {:?}", key, digest.short(), admission);
            }
            Err(reasons) => {
                self.metrics.record_rejection();
                for reason in reasons {
                    if let RejectionReason::StorageFailure(msg) = reason {
                        error!("Pool storage failed while admitting {}: {}", key, msg);
                    }
                }
                debug!("Rejected {} ({}): {:?}", key, digest.short(), reasons);
            }
        }
        result
    }

    /// Up to `limit` Ready records, oldest first
    pub fn ready_batch(&self, limit: usize) -> Result<Vec<OperationRecord>, RejectionReason> {
        Ok(self.ready.oldest(limit)?)
    }

    /// Apply a chain confirmation: every nonce below `chain_next_nonce` is
    /// spent, so drop those records from both pools and promote whatever
    /// the new floor unlocks.
    pub fn confirm(
        &self,
        account: &Address,
        chain_next_nonce: Nonce,
    ) -> Result<Confirmation, RejectionReason> {
        let ready_removed = self.drop_below(self.ready.as_ref(), account, chain_next_nonce)?;
        let future_removed = self.drop_below(self.future.as_ref(), account, chain_next_nonce)?;

        let floor = self.lowest_acceptable(account, chain_next_nonce)?;
        let promoted = self.cascade(account, floor);

        self.metrics.record_confirmed(ready_removed + future_removed);
        self.metrics.record_promoted(promoted);
        debug!(
            "Confirmed {} up to nonce {}: {} ready, {} future removed, {} promoted",
            account, chain_next_nonce, ready_removed, future_removed, promoted
        );

        Ok(Confirmation {
            ready_removed,
            future_removed,
            promoted,
        })
    }

    fn lowest_acceptable(
        &self,
        account: &Address,
        chain_next_nonce: Nonce,
    ) -> Result<Nonce, RejectionReason> {
        Ok(self
            .ready
            .next_nonce_of(account)?
            .map_or(chain_next_nonce, |next| next.max(chain_next_nonce)))
    }

    fn apply(
        &self,
        op: OperationRecord,
        chain_next_nonce: Nonce,
    ) -> Result<Admission, RejectionReason> {
        if op.nonce == Nonce::MAX {
            return Err(RejectionReason::ValidationFailed(format!(
                "nonce {} is reserved",
                Nonce::MAX
            )));
        }
        let lowest = self.lowest_acceptable(&op.account, chain_next_nonce)?;

        match op.nonce.cmp(&lowest) {
            Ordering::Less => self.replace(op, lowest),
            Ordering::Equal => {
                let account = op.account;
                self.ready.add(vec![op])?;
                // Admitted from here on; promotion cannot turn this into a rejection
                let promoted = match lowest.checked_add(1) {
                    Some(floor) => self.cascade(&account, floor),
                    None => 0,
                };
                Ok(Admission::Ready { promoted })
            }
            Ordering::Greater => self.enqueue(op),
        }
    }

    fn replace(&self, op: OperationRecord, lowest: Nonce) -> Result<Admission, RejectionReason> {
        let existing = self.ready.find(&op.account, op.nonce)?.ok_or(
            RejectionReason::DuplicateNonceRace {
                account: op.account,
                nonce: op.nonce,
            },
        )?;
        if op.reward <= existing.reward {
            return Err(RejectionReason::InsufficientReward {
                existing: existing.reward,
                offered: op.reward,
            });
        }

        let (account, nonce) = (op.account, op.nonce);
        self.ready.remove(&[existing])?;
        self.ready.add(vec![op])?;

        if nonce + 1 == lowest {
            return Ok(Admission::Replaced { reinserted: 0 });
        }

        let downstream = self.collect_after(self.ready.as_ref(), &account, nonce)?;
        if !downstream.is_empty() {
            self.ready.remove(&downstream)?;
            self.ready
                .add(downstream.iter().map(OperationRecord::unstored).collect())?;
        }
        Ok(Admission::Replaced {
            reinserted: downstream.len(),
        })
    }

    fn enqueue(&self, op: OperationRecord) -> Result<Admission, RejectionReason> {
        if let Some(existing) = self.future.find(&op.account, op.nonce)? {
            self.future.remove(&[existing])?;
            self.future.add(vec![op])?;
            return Ok(Admission::Queued {
                evicted: 0,
                superseded: true,
            });
        }

        let evicted = self.evict()?;
        self.future.add(vec![op])?;
        Ok(Admission::Queued {
            evicted,
            superseded: false,
        })
    }

    /// Make room for one more Future record, oldest serials first.
    ///
    /// Serials can have holes, so one threshold cut may fall short; repeat
    /// until the pool is below capacity.
    fn evict(&self) -> Result<usize, RejectionReason> {
        let max = self.config.max_future_entries;
        let mut evicted = 0;

        loop {
            let count = self.future.count()?;
            if count < max {
                break;
            }
            let excess = (count - max + 1) as u64;

            let Some(first_id) = self.future.first()?.and_then(|first| first.id) else {
                warn!(
                    "Future pool reports {} records but has no first entry; admitting over capacity",
                    count
                );
                break;
            };

            let threshold = first_id.saturating_add(excess);
            let cleared = self.future.clear_before_id(threshold)?;
            if cleared == 0 {
                warn!("Future eviction below id {} cleared nothing", threshold);
                break;
            }
            evicted += cleared;
        }

        if evicted > 0 {
            debug!("Evicted {} future records", evicted);
        }
        Ok(evicted)
    }

    /// Run the promotion cascade from `floor`, returning how many records
    /// moved. A pool failure stops the cascade and is logged; the records
    /// already moved stay moved.
    fn cascade(&self, account: &Address, floor: Nonce) -> usize {
        let mut total = 0;
        if let Err(reason) = self.promote(account, floor, &mut total) {
            error!(
                "Promotion of {} from nonce {} stopped after {} records: {}",
                account, floor, total, reason
            );
        }
        if total > 0 {
            debug!("Promoted {} future records of {}", total, account);
        }
        total
    }

    /// Move the account's Future records at `floor`, `floor + 1`, ... into
    /// Ready. Records below the floor are discarded.
    fn promote(
        &self,
        account: &Address,
        mut floor: Nonce,
        total: &mut usize,
    ) -> Result<(), RejectionReason> {
        let limit = self.config.query_limit;

        loop {
            let page = self.future.by_account_in_nonce_order(account, limit)?;
            let full_page = page.len() == limit;

            let mut promoted = Vec::new();
            let mut consumed = Vec::new();
            let mut gap = false;
            for record in page {
                match FutureSlot::classify(record.nonce, floor) {
                    FutureSlot::Stale => {
                        warn!(
                            "Discarding stale future record {} below floor {}",
                            record.key(),
                            floor
                        );
                        self.metrics.record_stale();
                        consumed.push(record);
                    }
                    FutureSlot::Next => {
                        promoted.push(record.unstored());
                        consumed.push(record);
                        match floor.checked_add(1) {
                            Some(next) => floor = next,
                            None => {
                                gap = true;
                                break;
                            }
                        }
                    }
                    FutureSlot::Gap => {
                        gap = true;
                        break;
                    }
                }
            }

            if !promoted.is_empty() {
                let moved = promoted.len();
                self.ready.add(promoted)?;
                *total += moved;
            }
            if !consumed.is_empty() {
                remove_present(self.future.as_ref(), &consumed)?;
            }

            if gap || !full_page {
                break;
            }
        }
        Ok(())
    }

    /// Every record of `account` in `pool` with nonce above `nonce`
    fn collect_after(
        &self,
        pool: &dyn OrderedPool,
        account: &Address,
        nonce: Nonce,
    ) -> Result<Vec<OperationRecord>, RejectionReason> {
        let limit = self.config.query_limit;
        let mut cursor = nonce;
        let mut collected = Vec::new();

        loop {
            let page = pool.find_after(account, cursor, limit)?;
            let full_page = page.len() == limit;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.nonce;
            collected.extend(page);
            if !full_page {
                break;
            }
        }
        Ok(collected)
    }

    /// Remove the account's records with nonce below `bound`
    fn drop_below(
        &self,
        pool: &dyn OrderedPool,
        account: &Address,
        bound: Nonce,
    ) -> Result<usize, RejectionReason> {
        let limit = self.config.query_limit;
        let mut removed = 0;

        loop {
            let page = pool.by_account_in_nonce_order(account, limit)?;
            let full_page = page.len() == limit;
            let spent: Vec<_> = page.into_iter().filter(|r| r.nonce < bound).collect();
            if spent.is_empty() {
                break;
            }

            let reached_bound = spent.len() < limit;
            removed += remove_present(pool, &spent)?;
            if reached_bound || !full_page {
                break;
            }
        }
        Ok(removed)
    }
}

/// Remove `records`, skipping any that another writer already removed.
///
/// Returns how many this call removed.
fn remove_present(
    pool: &dyn OrderedPool,
    records: &[OperationRecord],
) -> Result<usize, RejectionReason> {
    match pool.remove(records) {
        Ok(()) => Ok(records.len()),
        Err(PoolError::NotFound(key)) => {
            debug!("{} vanished before removal; removing one by one", key);
            let mut removed = 0;
            for record in records {
                match pool.remove(std::slice::from_ref(record)) {
                    Ok(()) => removed += 1,
                    Err(PoolError::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(removed)
        }
        Err(err) => Err(err.into()),
    }
}
