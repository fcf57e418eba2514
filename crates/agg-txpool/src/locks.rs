//! Per-account submission serialization

use crate::engine::{Admission, AdmissionEngine, Confirmation};
use crate::error::RejectionReason;
use agg_primitives::{Address, Nonce};
use agg_types::OperationRecord;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per account, created on first use
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl AccountLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account`
    pub async fn lock(&self, account: &Address) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(*account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Drop locks nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of accounts with a lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no account has a lock entry
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// [`AdmissionEngine`] front that runs one account's calls one at a time.
///
/// Calls for different accounts still run concurrently.
pub struct SerialSubmitter {
    engine: Arc<AdmissionEngine>,
    locks: AccountLocks,
}

impl SerialSubmitter {
    /// Wrap an engine
    pub fn new(engine: Arc<AdmissionEngine>) -> Self {
        Self {
            engine,
            locks: AccountLocks::new(),
        }
    }

    /// Wrapped engine
    pub fn engine(&self) -> &Arc<AdmissionEngine> {
        &self.engine
    }

    /// Serialized [`AdmissionEngine::submit`]
    pub async fn submit(&self, op: OperationRecord) -> Vec<RejectionReason> {
        self.admit(op).await.err().unwrap_or_default()
    }

    /// Serialized [`AdmissionEngine::admit`]
    pub async fn admit(&self, op: OperationRecord) -> Result<Admission, Vec<RejectionReason>> {
        let _guard = self.locks.lock(&op.account).await;
        self.engine.admit(op).await
    }

    /// Serialized [`AdmissionEngine::confirm`]
    pub async fn confirm(
        &self,
        account: &Address,
        chain_next_nonce: Nonce,
    ) -> Result<Confirmation, RejectionReason> {
        let _guard = self.locks.lock(account).await;
        self.engine.confirm(account, chain_next_nonce)
    }

    /// Release lock entries of idle accounts
    pub fn prune_locks(&self) {
        self.locks.prune();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let account = Address::from_bytes([1; 20]);

        let guard = locks.lock(&account).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&account).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.lock(&Address::from_bytes([1; 20])).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock(&Address::from_bytes([2; 20])),
        )
        .await
        .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = AccountLocks::new();
        let held = locks.lock(&Address::from_bytes([1; 20])).await;
        drop(locks.lock(&Address::from_bytes([2; 20])).await);

        locks.prune();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
