//! Metrics registry
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase, reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for the query engine.
///
/// All counters use atomic operations with Relaxed ordering; exactness
/// across threads is not required for metrics.
#[derive(Debug)]
pub struct MetricsRegistry {
    /// Queries planned and frozen successfully
    plans_built: AtomicU64,
    /// Queries rejected as infeasible by the planner
    plans_rejected: AtomicU64,
    /// Per-node plan caches that grew past the warning threshold
    plan_cache_overflows: AtomicU64,
    /// Temporary indexes materialized
    tempindexes_built: AtomicU64,
    /// Rows inserted into temporary indexes
    tempindex_rows: AtomicU64,
}

impl MetricsRegistry {
    /// Creates a registry with all counters at zero.
    pub const fn new() -> Self {
        Self {
            plans_built: AtomicU64::new(0),
            plans_rejected: AtomicU64::new(0),
            plan_cache_overflows: AtomicU64::new(0),
            tempindexes_built: AtomicU64::new(0),
            tempindex_rows: AtomicU64::new(0),
        }
    }

    /// Increment plans built.
    pub fn increment_plans_built(&self) {
        self.plans_built.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment plans rejected.
    pub fn increment_plans_rejected(&self) {
        self.plans_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment plan cache overflows.
    pub fn increment_plan_cache_overflows(&self) {
        self.plan_cache_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment temp indexes built.
    pub fn increment_tempindexes_built(&self) {
        self.tempindexes_built.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to temp index row count.
    pub fn add_tempindex_rows(&self, rows: u64) {
        self.tempindex_rows.fetch_add(rows, Ordering::Relaxed);
    }

    /// Get plans built.
    pub fn plans_built(&self) -> u64 {
        self.plans_built.load(Ordering::Relaxed)
    }

    /// Get plans rejected.
    pub fn plans_rejected(&self) -> u64 {
        self.plans_rejected.load(Ordering::Relaxed)
    }

    /// Get plan cache overflows.
    pub fn plan_cache_overflows(&self) -> u64 {
        self.plan_cache_overflows.load(Ordering::Relaxed)
    }

    /// Get temp indexes built.
    pub fn tempindexes_built(&self) -> u64 {
        self.tempindexes_built.load(Ordering::Relaxed)
    }

    /// Get temp index rows inserted.
    pub fn tempindex_rows(&self) -> u64 {
        self.tempindex_rows.load(Ordering::Relaxed)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: MetricsRegistry = MetricsRegistry::new();

/// The process-wide registry, exposed to the surrounding system.
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let m = MetricsRegistry::new();
        assert_eq!(m.plans_built(), 0);
        m.increment_plans_built();
        m.increment_plans_built();
        assert_eq!(m.plans_built(), 2);
        m.add_tempindex_rows(7);
        assert_eq!(m.tempindex_rows(), 7);
    }

    #[test]
    fn test_global_registry_is_monotonic() {
        let before = metrics().plan_cache_overflows();
        metrics().increment_plan_cache_overflows();
        assert!(metrics().plan_cache_overflows() >= before + 1);
    }
}
