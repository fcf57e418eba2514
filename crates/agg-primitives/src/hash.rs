//! 256-bit digest type and keccak hashing

use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

/// Hash parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid hash length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },
}

/// 256-bit digest (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct H256([u8; 32]);

impl H256 {
    /// Size in bytes
    pub const LEN: usize = 32;

    /// Zero hash
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }

    /// Create from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, HashError> {
        if slice.len() != Self::LEN {
            return Err(HashError::InvalidLength {
                expected: Self::LEN,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(H256(bytes))
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Shortened form for log lines (first four bytes)
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", self.to_hex())
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for H256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Keccak-256 digest of `data`
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    H256(bytes)
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::H256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for H256 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_hex())
        }
    }

    impl<'de> Deserialize<'de> for H256 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            H256::from_hex(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // keccak256("") = c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
        let digest = keccak256(&[]);
        assert_eq!(
            digest.to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_distinguishes_inputs() {
        assert_ne!(keccak256(b"a"), keccak256(b"b"));
        assert_eq!(keccak256(b"a"), keccak256(b"a"));
    }

    #[test]
    fn test_hash_from_slice_length() {
        let result = H256::from_slice(&[0u8; 31]);
        assert!(matches!(
            result,
            Err(HashError::InvalidLength { expected: 32, got: 31 })
        ));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = H256::from_bytes([0x5a; 32]);
        assert_eq!(H256::from_hex(&hash.to_hex()).unwrap(), hash);
    }

    #[test]
    fn test_hash_short() {
        let hash = H256::from_bytes([0xab; 32]);
        assert_eq!(hash.short(), "0xabababab");
    }
}
