//! Scenario replay through the admission engine

use crate::cli::StoreKind;
use crate::config::{NodeConfig, Scenario, ScenarioStep};
use agg_primitives::{Address, Nonce, H256};
use agg_storage::{Database, DbConfig, MemoryPool, OrderedPool, PoolTable, RocksPool};
use agg_txpool::{
    Admission, AdmissionEngine, Confirmation, MemoryOracle, MetricsSnapshot, RejectionReason,
    SerialSubmitter,
};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Everything a replay produced
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Outcome per scenario step
    pub steps: Vec<StepOutcome>,
    /// Oldest Ready operations, as aggregation would take them
    pub ready_batch: Vec<BatchEntry>,
    /// Ready pool size after the last step
    pub ready_count: usize,
    /// Future pool size after the last step
    pub future_count: usize,
    /// Engine counters
    pub metrics: MetricsSnapshot,
}

/// Outcome of one scenario step
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    /// Position in the scenario
    pub index: usize,
    /// Account the step touched
    pub account: Address,
    /// Nonce of the step
    pub nonce: Nonce,
    /// What happened
    #[serde(flatten)]
    pub result: StepResult,
}

/// Result of a step
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    /// Admitted into Ready
    Ready {
        /// Future records promoted behind it
        promoted: usize,
    },
    /// Queued in Future
    Queued {
        /// Records evicted for room
        evicted: usize,
        /// Replaced a queued record at the same nonce
        superseded: bool,
    },
    /// Replaced a Ready record
    Replaced {
        /// Downstream records re-inserted
        reinserted: usize,
    },
    /// Chain confirmation applied
    Confirmed {
        /// Ready records dropped
        ready_removed: usize,
        /// Future records dropped
        future_removed: usize,
        /// Future records promoted
        promoted: usize,
    },
    /// Not admitted
    Rejected {
        /// Rejection kinds
        kinds: Vec<&'static str>,
        /// Human-readable reasons
        reasons: Vec<String>,
    },
}

impl From<Admission> for StepResult {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Ready { promoted } => StepResult::Ready { promoted },
            Admission::Queued {
                evicted,
                superseded,
            } => StepResult::Queued {
                evicted,
                superseded,
            },
            Admission::Replaced { reinserted } => StepResult::Replaced { reinserted },
        }
    }
}

impl From<Confirmation> for StepResult {
    fn from(c: Confirmation) -> Self {
        StepResult::Confirmed {
            ready_removed: c.ready_removed,
            future_removed: c.future_removed,
            promoted: c.promoted,
        }
    }
}

impl From<Vec<RejectionReason>> for StepResult {
    fn from(reasons: Vec<RejectionReason>) -> Self {
        StepResult::Rejected {
            kinds: reasons.iter().map(RejectionReason::kind).collect(),
            reasons: reasons.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One Ready operation in the reported batch
#[derive(Debug, Serialize)]
pub struct BatchEntry {
    /// Pool serial
    pub id: Option<u64>,
    /// Signing account
    pub account: Address,
    /// Nonce
    pub nonce: Nonce,
    /// Reward (decimal)
    pub reward: String,
    /// Content digest
    pub digest: H256,
}

fn open_pools(config: &NodeConfig) -> Result<(Arc<dyn OrderedPool>, Arc<dyn OrderedPool>)> {
    match config.store {
        StoreKind::Memory => Ok((Arc::new(MemoryPool::new()), Arc::new(MemoryPool::new()))),
        StoreKind::Rocksdb => {
            tracing::info!("Opening pool database at {:?}", config.datadir);
            let db = Database::new(&config.datadir);
            db.open_with_config(DbConfig::default())?;
            let ready = RocksPool::open(db.clone(), PoolTable::Ready)?;
            let future = RocksPool::open(db, PoolTable::Future)?;
            Ok((Arc::new(ready), Arc::new(future)))
        }
    }
}

/// Run every step of `scenario` against a fresh engine
pub async fn run(config: &NodeConfig, scenario: &Scenario) -> Result<ReplayReport> {
    let (ready, future) = open_pools(config)?;
    let oracle = Arc::new(MemoryOracle::new());
    for entry in &scenario.chain {
        oracle.set_nonce(entry.account, entry.nonce);
    }

    let engine = Arc::new(AdmissionEngine::new(
        config.pool.clone(),
        ready,
        future,
        oracle.clone(),
    )?);
    let submitter = SerialSubmitter::new(engine.clone());

    tracing::info!("Replaying {} steps", scenario.steps.len());
    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = match step {
            ScenarioStep::Submit { account, nonce, .. } => {
                let result = match step.to_operation(index)? {
                    Some(op) => match submitter.admit(op).await {
                        Ok(admission) => admission.into(),
                        Err(reasons) => reasons.into(),
                    },
                    None => continue,
                };
                StepOutcome {
                    index,
                    account: *account,
                    nonce: *nonce,
                    result,
                }
            }
            ScenarioStep::Confirm { account, nonce } => {
                oracle.set_nonce(*account, *nonce);
                let result = match submitter.confirm(account, *nonce).await {
                    Ok(confirmation) => confirmation.into(),
                    Err(reason) => vec![reason].into(),
                };
                StepOutcome {
                    index,
                    account: *account,
                    nonce: *nonce,
                    result,
                }
            }
        };
        steps.push(outcome);
    }

    let ready_batch = engine
        .ready_batch(config.batch_size)?
        .into_iter()
        .map(|record| BatchEntry {
            id: record.id,
            account: record.account,
            nonce: record.nonce,
            reward: record.reward.to_string(),
            digest: record.digest(),
        })
        .collect();
    let ready_count = engine.ready().count()?;
    let future_count = engine.future().count()?;
    tracing::info!(
        "Replay finished: {} ready, {} future",
        ready_count,
        future_count
    );

    Ok(ReplayReport {
        steps,
        ready_batch,
        ready_count,
        future_count,
        metrics: engine.metrics().snapshot(),
    })
}
