//! # agg-types
//!
//! Core types for the operation aggregator.
//!
//! This crate provides:
//! - [`OperationRecord`](record::OperationRecord) - One signed account operation
//! - [`RecordKey`](record::RecordKey) - The (account, nonce) identity of a record
//! - [`codec`] - Fixed-layout binary encoding used by persistent pools

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod record;

pub use codec::{decode_key, decode_record, encode_key, encode_record};
pub use record::{OperationRecord, RecordKey};
