//! Operation record

use agg_primitives::{keccak256, Address, Nonce, Reward, H256};
use bytes::Bytes;
use std::fmt;

/// Identity of a record inside one pool: at most one record per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Signing account
    pub account: Address,
    /// Account-scoped nonce
    pub nonce: Nonce,
}

impl RecordKey {
    /// Create a new key
    pub fn new(account: Address, nonce: Nonce) -> Self {
        Self { account, nonce }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.account, self.nonce)
    }
}

/// A signed account operation waiting to be aggregated.
///
/// Records are immutable once a pool has stored them. The `id` is the
/// serial the storing pool assigned; it orders records for eviction and
/// batch selection and is never consulted for nonce sequencing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRecord {
    /// Pool-assigned serial, `None` until first insertion
    pub id: Option<u64>,
    /// Signing account
    pub account: Address,
    /// Account-scoped sequence number
    pub nonce: Nonce,
    /// Fee offered to the aggregator
    pub reward: Reward,
    /// Opaque signed body (actions and signature material)
    pub payload: Bytes,
}

impl OperationRecord {
    /// Create a record that has not been stored yet
    pub fn new(account: Address, nonce: Nonce, reward: Reward, payload: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            account,
            nonce,
            reward,
            payload: payload.into(),
        }
    }

    /// The (account, nonce) identity of this record
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.account, self.nonce)
    }

    /// Copy of this record carrying the given serial
    pub fn with_id(&self, id: u64) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    /// Copy of this record with its serial cleared, ready for re-insertion
    pub fn unstored(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }

    /// Compare everything except the pool serial
    pub fn same_content(&self, other: &Self) -> bool {
        self.account == other.account
            && self.nonce == other.nonce
            && self.reward == other.reward
            && self.payload == other.payload
    }

    /// Keccak digest over account, nonce, reward and payload.
    ///
    /// Independent of the pool serial, so a record keeps its digest across
    /// re-insertion.
    pub fn digest(&self) -> H256 {
        let mut buf = Vec::with_capacity(20 + 8 + 32 + self.payload.len());
        buf.extend_from_slice(self.account.as_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        let mut reward = [0u8; 32];
        self.reward.to_big_endian(&mut reward);
        buf.extend_from_slice(&reward);
        buf.extend_from_slice(&self.payload);
        keccak256(&buf)
    }
}
