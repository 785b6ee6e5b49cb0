//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the analytics core
///
/// Relaxed ordering is enough: counters are observational and never
/// synchronize other memory.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    intents_parsed: AtomicU64,
    low_confidence_intents: AtomicU64,
    plans_built: AtomicU64,
    plans_rejected: AtomicU64,
    queries_emitted: AtomicU64,
    queries_rejected: AtomicU64,
    estimates_computed: AtomicU64,
    estimate_failures: AtomicU64,
    values_excluded: AtomicU64,
    decisions_made: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_intents_parsed(&self) {
        self.intents_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_low_confidence(&self) {
        self.low_confidence_intents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_built(&self) {
        self.plans_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_rejected(&self) {
        self.plans_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_emitted(&self) {
        self.queries_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_estimates(&self) {
        self.estimates_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_estimate_failures(&self) {
        self.estimate_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the number of response values dropped during coercion
    pub fn add_values_excluded(&self, count: u64) {
        self.values_excluded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_decisions(&self) {
        self.decisions_made.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            intents_parsed: self.intents_parsed.load(Ordering::Relaxed),
            low_confidence_intents: self.low_confidence_intents.load(Ordering::Relaxed),
            plans_built: self.plans_built.load(Ordering::Relaxed),
            plans_rejected: self.plans_rejected.load(Ordering::Relaxed),
            queries_emitted: self.queries_emitted.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            estimates_computed: self.estimates_computed.load(Ordering::Relaxed),
            estimate_failures: self.estimate_failures.load(Ordering::Relaxed),
            values_excluded: self.values_excluded.load(Ordering::Relaxed),
            decisions_made: self.decisions_made.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub intents_parsed: u64,
    pub low_confidence_intents: u64,
    pub plans_built: u64,
    pub plans_rejected: u64,
    pub queries_emitted: u64,
    pub queries_rejected: u64,
    pub estimates_computed: u64,
    pub estimate_failures: u64,
    pub values_excluded: u64,
    pub decisions_made: u64,
}
