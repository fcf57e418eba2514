//! Binary encoding/decoding for operation records.
//!
//! Provides the deterministic layout persistent pools store. Integers are
//! big-endian so that encoded keys sort the same way as their values.

use crate::record::{OperationRecord, RecordKey};
use agg_primitives::{Address, U256};
use bytes::Bytes;

/// Encoded length of a [`RecordKey`]
pub const KEY_LEN: usize = 20 + 8;

/// Fixed part of an encoded record: id, account, nonce, reward, payload length
const RECORD_HEADER_LEN: usize = 8 + 20 + 8 + 32 + 4;

// ============================================================================
// Key Encoding
// ============================================================================

/// Encode a key as `account || nonce` (28 bytes).
pub fn encode_key(key: &RecordKey) -> [u8; KEY_LEN] {
    let mut buf = [0u8; KEY_LEN];
    buf[..20].copy_from_slice(key.account.as_bytes());
    buf[20..].copy_from_slice(&key.nonce.to_be_bytes());
    buf
}

/// Decode a key produced by [`encode_key`].
pub fn decode_key(bytes: &[u8]) -> Option<RecordKey> {
    if bytes.len() != KEY_LEN {
        return None;
    }
    let account = Address::from_slice(&bytes[..20]).ok()?;
    let nonce = u64::from_be_bytes(bytes[20..].try_into().ok()?);
    Some(RecordKey::new(account, nonce))
}

// ============================================================================
// Record Encoding
// ============================================================================

/// Largest payload the 4-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Length field for a payload of `len` bytes, `None` past [`MAX_PAYLOAD_LEN`]
fn encode_payload_len(len: usize) -> Option<[u8; 4]> {
    u32::try_from(len).ok().map(u32::to_be_bytes)
}

/// Encode a stored record.
///
/// Returns `None` if the record has no id yet or its payload is longer than
/// [`MAX_PAYLOAD_LEN`].
pub fn encode_record(record: &OperationRecord) -> Option<Vec<u8>> {
    let id = record.id?;
    let payload_len = encode_payload_len(record.payload.len())?;
    let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + record.payload.len());
    buf.extend_from_slice(&id.to_be_bytes());                        // 8
    buf.extend_from_slice(record.account.as_bytes());                // 20
    buf.extend_from_slice(&record.nonce.to_be_bytes());              // 8
    let mut reward = [0u8; 32];
    record.reward.to_big_endian(&mut reward);
    buf.extend_from_slice(&reward);                                  // 32
    buf.extend_from_slice(&payload_len);                             // 4
    buf.extend_from_slice(&record.payload);                          // variable
    Some(buf)
}

/// Decode a record produced by [`encode_record`].
pub fn decode_record(bytes: &[u8]) -> Option<OperationRecord> {
    if bytes.len() < RECORD_HEADER_LEN {
        return None;
    }
    let mut pos = 0;

    let id = u64::from_be_bytes(bytes[pos..pos + 8].try_into().ok()?); pos += 8;
    let account = Address::from_slice(&bytes[pos..pos + 20]).ok()?; pos += 20;
    let nonce = u64::from_be_bytes(bytes[pos..pos + 8].try_into().ok()?); pos += 8;
    let reward = U256::from_big_endian(&bytes[pos..pos + 32]); pos += 32;
    let payload_len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize; pos += 4;

    if pos + payload_len != bytes.len() {
        return None;
    }
    let payload = Bytes::copy_from_slice(&bytes[pos..]);

    Some(OperationRecord {
        id: Some(id),
        account,
        nonce,
        reward,
        payload,
    })
}
