//! Admission error types

use agg_primitives::{Address, Nonce, Reward};
use agg_storage::PoolError;
use thiserror::Error;

/// Why a submitted operation was not admitted.
///
/// Every variant is reported to the caller; none of them is fatal to the
/// engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Malformed operation or bad signature, reported by the oracle
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The targeted slot changed under a concurrent writer
    #[error("nonce {nonce} of {account} changed concurrently")]
    DuplicateNonceRace {
        /// Signing account
        account: Address,
        /// Contested nonce
        nonce: Nonce,
    },

    /// The Ready operation at this nonce pays at least as much
    #[error("insufficient reward: existing {existing}, offered {offered}")]
    InsufficientReward {
        /// Reward of the stored operation
        existing: Reward,
        /// Reward of the submitted operation
        offered: Reward,
    },

    /// Pool backend failure
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl RejectionReason {
    /// Stable machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            RejectionReason::ValidationFailed(_) => "validation_failed",
            RejectionReason::DuplicateNonceRace { .. } => "duplicate_nonce_race",
            RejectionReason::InsufficientReward { .. } => "insufficient_reward",
            RejectionReason::StorageFailure(_) => "storage_failure",
        }
    }
}

impl From<PoolError> for RejectionReason {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::DuplicateKey(key) | PoolError::NotFound(key) => {
                RejectionReason::DuplicateNonceRace {
                    account: key.account,
                    nonce: key.nonce,
                }
            }
            PoolError::Storage(err) => RejectionReason::StorageFailure(err.to_string()),
        }
    }
}

/// Invalid engine configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Future pool must hold at least one record
    #[error("max_future_entries must be at least 1")]
    ZeroFutureCapacity,

    /// Pagination needs a positive page size
    #[error("query_limit must be at least 1")]
    ZeroQueryLimit,
}
