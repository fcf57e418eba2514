//! Account state oracle

use crate::error::RejectionReason;
use agg_primitives::{Address, Nonce};
use agg_types::OperationRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of on-chain account state and operation validity.
///
/// `validate` answers both questions at once: either the account's next
/// valid on-chain nonce, or every reason the operation is unacceptable.
#[async_trait]
pub trait AccountStateOracle: Send + Sync {
    /// Validate `op` and return the chain's next nonce for its account
    async fn validate(&self, op: &OperationRecord) -> Result<Nonce, Vec<RejectionReason>>;
}

/// Oracle backed by an in-memory nonce table.
///
/// Accounts it has never seen are at nonce 0.
pub struct MemoryOracle {
    nonces: RwLock<HashMap<Address, Nonce>>,
    max_payload_size: usize,
}

impl MemoryOracle {
    /// Default payload size bound
    pub const DEFAULT_MAX_PAYLOAD: usize = 128 * 1024;

    /// Create an oracle with the default payload bound
    pub fn new() -> Self {
        Self::with_max_payload(Self::DEFAULT_MAX_PAYLOAD)
    }

    /// Create an oracle rejecting payloads longer than `max_payload_size`
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            nonces: RwLock::new(HashMap::new()),
            max_payload_size,
        }
    }

    /// Set the chain's next nonce for `account`
    pub fn set_nonce(&self, account: Address, nonce: Nonce) {
        self.nonces.write().insert(account, nonce);
    }

    /// Chain's next nonce for `account`
    pub fn nonce_of(&self, account: &Address) -> Nonce {
        self.nonces.read().get(account).copied().unwrap_or(0)
    }
}

impl Default for MemoryOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStateOracle for MemoryOracle {
    async fn validate(&self, op: &OperationRecord) -> Result<Nonce, Vec<RejectionReason>> {
        let mut reasons = Vec::new();
        if op.account.is_zero() {
            reasons.push(RejectionReason::ValidationFailed("zero account".into()));
        }
        if op.payload.is_empty() {
            reasons.push(RejectionReason::ValidationFailed("empty payload".into()));
        }
        if op.payload.len() > self.max_payload_size {
            reasons.push(RejectionReason::ValidationFailed(format!(
                "payload of {} bytes exceeds {}",
                op.payload.len(),
                self.max_payload_size
            )));
        }

        if reasons.is_empty() {
            Ok(self.nonce_of(&op.account))
        } else {
            Err(reasons)
        }
    }
}
