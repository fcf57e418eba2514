//! Admission metrics

use crate::engine::Admission;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram for tracking value distributions
pub struct Histogram {
    /// Bucket upper bounds (in microseconds)
    buckets: Vec<u64>,
    /// Counts per bucket, plus one overflow bucket
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(vec![10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000])
    }

    /// Create histogram with custom bucket bounds
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let slot = self
            .buckets
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.buckets.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean of all observations
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Number of observations
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Per-bucket counts; the last entry counts values above every bound
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters maintained by the admission engine
#[derive(Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    accepted_ready: AtomicU64,
    accepted_future: AtomicU64,
    replaced: AtomicU64,
    rejected: AtomicU64,
    promoted: AtomicU64,
    reinserted: AtomicU64,
    evicted: AtomicU64,
    stale_discarded: AtomicU64,
    confirmed: AtomicU64,
    submit_latency: Histogram,
}

impl PoolMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submit(&self, elapsed: Duration) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.submit_latency.observe(elapsed.as_micros() as u64);
    }

    pub(crate) fn record_admission(&self, admission: &Admission) {
        match admission {
            Admission::Ready { promoted } => {
                self.accepted_ready.fetch_add(1, Ordering::Relaxed);
                self.promoted.fetch_add(*promoted as u64, Ordering::Relaxed);
            }
            Admission::Queued { evicted, .. } => {
                self.accepted_future.fetch_add(1, Ordering::Relaxed);
                self.evicted.fetch_add(*evicted as u64, Ordering::Relaxed);
            }
            Admission::Replaced { reinserted } => {
                self.replaced.fetch_add(1, Ordering::Relaxed);
                self.reinserted.fetch_add(*reinserted as u64, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_promoted(&self, count: usize) {
        self.promoted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_confirmed(&self, count: usize) {
        self.confirmed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            submitted: load(&self.submitted),
            accepted_ready: load(&self.accepted_ready),
            accepted_future: load(&self.accepted_future),
            replaced: load(&self.replaced),
            rejected: load(&self.rejected),
            promoted: load(&self.promoted),
            reinserted: load(&self.reinserted),
            evicted: load(&self.evicted),
            stale_discarded: load(&self.stale_discarded),
            confirmed: load(&self.confirmed),
            submit_latency: LatencySummary {
                mean_us: self.submit_latency.mean(),
                count: self.submit_latency.total_count(),
                buckets: self.submit_latency.bucket_counts(),
            },
        }
    }
}

/// Serializable view of [`PoolMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Calls to submit
    pub submitted: u64,
    /// Operations admitted straight into Ready
    pub accepted_ready: u64,
    /// Operations queued in Future
    pub accepted_future: u64,
    /// Successful replacements
    pub replaced: u64,
    /// Submissions rejected for any reason
    pub rejected: u64,
    /// Future records moved into Ready
    pub promoted: u64,
    /// Downstream Ready records re-inserted after a replacement
    pub reinserted: u64,
    /// Future records dropped for capacity
    pub evicted: u64,
    /// Future records found below the floor during promotion
    pub stale_discarded: u64,
    /// Records dropped because the chain confirmed their nonce
    pub confirmed: u64,
    /// Submit latency
    pub submit_latency: LatencySummary,
}

/// Summary of the submit latency histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Mean latency in microseconds
    pub mean_us: f64,
    /// Observation count
    pub count: u64,
    /// Per-bucket counts
    pub buckets: Vec<u64>,
}

impl MetricsSnapshot {
    /// Export snapshot as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
