//! # agg-primitives
//!
//! Primitive types shared by the aggregator crates.
//!
//! This crate provides account addresses, 256-bit digests and the
//! numeric aliases used for nonces and rewards.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;

pub use address::{Address, AddressError};
pub use hash::{keccak256, HashError, H256};

// Re-export primitive-types for U256
pub use primitive_types::U256;

/// Account-scoped operation sequence number
pub type Nonce = u64;

/// Fee offered to the aggregator for including an operation
pub type Reward = U256;
