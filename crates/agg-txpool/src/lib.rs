//! # agg-txpool
//!
//! Admission and ordering engine for signed account operations.
//!
//! This crate provides:
//! - Classification of incoming operations into Ready and Future pools
//! - Promotion of Future operations as nonce gaps close
//! - Reward-based replacement of Ready operations
//! - Bounded Future storage with oldest-first eviction
//! - Per-account serialization of submissions
//!
//! ## Architecture
//!
//! ```text
//! +----------------------+       +---------------------+
//! |   SerialSubmitter    | ----> | AccountStateOracle  |
//! |  (per-account lock)  |       +---------------------+
//! +----------------------+
//!            |
//! +----------------------+
//! |   AdmissionEngine    |
//! +----------------------+
//!            |
//! +----------+-----------+
//! |  Ready   |  Future   |  <- two OrderedPool instances
//! +----------+-----------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use agg_txpool::{AdmissionEngine, PoolConfig};
//!
//! let engine = AdmissionEngine::new(PoolConfig::default(), ready, future, oracle)?;
//! let reasons = engine.submit(op).await;
//! assert!(reasons.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod engine;
mod error;
mod locks;
mod metrics;
mod oracle;

pub use config::PoolConfig;
pub use engine::{Admission, AdmissionEngine, Confirmation};
pub use error::{ConfigError, RejectionReason};
pub use locks::{AccountLocks, SerialSubmitter};
pub use metrics::{Histogram, LatencySummary, MetricsSnapshot, PoolMetrics};
pub use oracle::{AccountStateOracle, MemoryOracle};
