//! Configuration and scenario types for agg-node

use crate::cli::{ReplayArgs, StoreKind};
use agg_primitives::{Address, Nonce, U256};
use agg_txpool::PoolConfig;
use agg_types::OperationRecord;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Pool backend
    pub store: StoreKind,
    /// Data directory for the rocksdb backend
    pub datadir: PathBuf,
    /// Admission engine settings
    pub pool: PoolConfig,
    /// Maximum operations in the reported ready batch
    pub batch_size: usize,
}

impl From<&ReplayArgs> for NodeConfig {
    fn from(args: &ReplayArgs) -> Self {
        Self {
            store: args.store,
            datadir: args.datadir.clone(),
            pool: PoolConfig {
                max_future_entries: args.max_future,
                query_limit: args.query_limit,
            },
            batch_size: args.batch_size,
        }
    }
}

/// Scenario file errors
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Reward is neither decimal nor 0x-hex
    #[error("invalid reward {0:?}")]
    InvalidReward(String),
    /// Payload is not hex
    #[error("invalid payload at step {0}")]
    InvalidPayload(usize),
}

/// A replayable sequence of engine calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Chain nonces known before the first step
    #[serde(default)]
    pub chain: Vec<ChainNonce>,
    /// Steps in submission order
    pub steps: Vec<ScenarioStep>,
}

/// On-chain next nonce of one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainNonce {
    /// Account address (hex)
    pub account: Address,
    /// Next valid nonce
    pub nonce: Nonce,
}

/// One scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Submit an operation
    Submit {
        /// Signing account (hex)
        account: Address,
        /// Operation nonce
        nonce: Nonce,
        /// Reward, decimal or 0x-hex
        reward: String,
        /// Payload bytes (hex)
        payload: String,
    },
    /// The chain confirmed every nonce below `nonce`
    Confirm {
        /// Account address (hex)
        account: Address,
        /// New next valid nonce
        nonce: Nonce,
    },
}

impl ScenarioStep {
    /// Build the operation a `submit` step describes
    pub fn to_operation(&self, index: usize) -> Result<Option<OperationRecord>, ScenarioError> {
        match self {
            ScenarioStep::Submit {
                account,
                nonce,
                reward,
                payload,
            } => {
                let reward = parse_reward(reward)?;
                let payload = parse_payload(payload).ok_or(ScenarioError::InvalidPayload(index))?;
                Ok(Some(OperationRecord::new(*account, *nonce, reward, payload)))
            }
            ScenarioStep::Confirm { .. } => Ok(None),
        }
    }
}

/// Parse a reward from hex or decimal string
pub fn parse_reward(s: &str) -> Result<U256, ScenarioError> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) => U256::from_str_radix(digits, 16).ok(),
        None => U256::from_dec_str(trimmed).ok(),
    };
    parsed.ok_or_else(|| ScenarioError::InvalidReward(s.to_string()))
}

/// Parse payload bytes from hex string
pub fn parse_payload(s: &str) -> Option<Bytes> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).ok().map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reward_hex_and_decimal() {
        assert_eq!(parse_reward("0x10").unwrap(), U256::from(16u64));
        assert_eq!(parse_reward(" 250 ").unwrap(), U256::from(250u64));
        assert!(matches!(parse_reward("ten"), Err(ScenarioError::InvalidReward(_))));
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload("0xdead").unwrap().as_ref(), &[0xde, 0xad]);
        assert_eq!(parse_payload("beef").unwrap().as_ref(), &[0xbe, 0xef]);
        assert!(parse_payload("0xzz").is_none());
    }

    #[test]
    fn test_scenario_json() {
        let json = r#"{
            "chain": [
                { "account": "0x1111111111111111111111111111111111111111", "nonce": 3 }
            ],
            "steps": [
                {
                    "action": "submit",
                    "account": "0x1111111111111111111111111111111111111111",
                    "nonce": 3,
                    "reward": "100",
                    "payload": "0x01"
                },
                {
                    "action": "confirm",
                    "account": "0x1111111111111111111111111111111111111111",
                    "nonce": 4
                }
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.chain[0].nonce, 3);
        assert_eq!(scenario.steps.len(), 2);

        let op = scenario.steps[0].to_operation(0).unwrap().unwrap();
        assert_eq!(op.nonce, 3);
        assert_eq!(op.reward, U256::from(100u64));
        assert!(scenario.steps[1].to_operation(1).unwrap().is_none());
    }

    #[test]
    fn test_bad_payload_reports_step() {
        let step = ScenarioStep::Submit {
            account: Address::from_bytes([1; 20]),
            nonce: 0,
            reward: "1".into(),
            payload: "xyz".into(),
        };
        assert!(matches!(step.to_operation(7), Err(ScenarioError::InvalidPayload(7))));
    }
}
