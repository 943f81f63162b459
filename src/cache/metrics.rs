//! Cache Metrics
//!
//! Lock-free counters for one cache region. Everything is a relaxed atomic;
//! callers read a consistent-enough `MetricsSnapshot` rather than the live
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime metrics for a single region
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Lookup outcomes per tier
    local_hits: AtomicU64,
    local_misses: AtomicU64,
    remote_hits: AtomicU64,
    remote_misses: AtomicU64,

    // Read-through activity
    loads: AtomicU64,
    load_failures: AtomicU64,
    backfills: AtomicU64,

    // Mutations
    puts: AtomicU64,
    evictions: AtomicU64,

    // Remote failures absorbed by the degrade-to-miss policy
    degraded_ops: AtomicU64,

    // Gauge refreshed from the local tier on snapshot
    local_entries: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_miss(&self) {
        self.local_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_miss(&self) {
        self.remote_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backfill(&self) {
        self.backfills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded_op(&self) {
        self.degraded_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_local_entries(&self, entries: u64) {
        self.local_entries.store(entries, Ordering::Relaxed);
    }

    pub fn local_hit_ratio(&self) -> f64 {
        let hits = self.local_hits.load(Ordering::Relaxed);
        let misses = self.local_misses.load(Ordering::Relaxed);
        ratio(hits, misses)
    }

    pub fn remote_hit_ratio(&self) -> f64 {
        let hits = self.remote_hits.load(Ordering::Relaxed);
        let misses = self.remote_misses.load(Ordering::Relaxed);
        ratio(hits, misses)
    }

    /// Fraction of lookups answered by either tier
    pub fn overall_hit_ratio(&self) -> f64 {
        let hits = self.local_hits.load(Ordering::Relaxed)
            + self.remote_hits.load(Ordering::Relaxed);
        // Only a remote miss means the lookup missed both tiers
        let misses = self.remote_misses.load(Ordering::Relaxed);
        ratio(hits, misses)
    }

    pub fn degraded_ops(&self) -> u64 {
        self.degraded_ops.load(Ordering::Relaxed)
    }

    /// Capture a point-in-time view of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            local_misses: self.local_misses.load(Ordering::Relaxed),
            local_hit_ratio: self.local_hit_ratio(),
            local_entries: self.local_entries.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            remote_misses: self.remote_misses.load(Ordering::Relaxed),
            remote_hit_ratio: self.remote_hit_ratio(),
            overall_hit_ratio: self.overall_hit_ratio(),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            backfills: self.backfills.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            degraded_ops: self.degraded_ops.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.local_hits.store(0, Ordering::Relaxed);
        self.local_misses.store(0, Ordering::Relaxed);
        self.remote_hits.store(0, Ordering::Relaxed);
        self.remote_misses.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        self.load_failures.store(0, Ordering::Relaxed);
        self.backfills.store(0, Ordering::Relaxed);
        self.puts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.degraded_ops.store(0, Ordering::Relaxed);
        self.local_entries.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics view
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub local_hits: u64,
    pub local_misses: u64,
    pub local_hit_ratio: f64,
    pub local_entries: u64,
    pub remote_hits: u64,
    pub remote_misses: u64,
    pub remote_hit_ratio: f64,
    pub overall_hit_ratio: f64,
    pub loads: u64,
    pub load_failures: u64,
    pub backfills: u64,
    pub puts: u64,
    pub evictions: u64,
    pub degraded_ops: u64,
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total > 0 {
        hits as f64 / total as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = CacheMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.local_hits, 0);
        assert_eq!(snapshot.local_hit_ratio, 0.0);
    }

    #[test]
    fn test_local_hit_ratio() {
        let metrics = CacheMetrics::new();
        metrics.record_local_hit();
        metrics.record_local_hit();
        metrics.record_local_miss();

        assert!((metrics.local_hit_ratio() - 0.6666).abs() < 0.001);
    }

    #[test]
    fn test_overall_ratio_counts_double_misses_only() {
        let metrics = CacheMetrics::new();
        // lookup 1: local miss, remote hit
        metrics.record_local_miss();
        metrics.record_remote_hit();
        // lookup 2: missed both tiers
        metrics.record_local_miss();
        metrics.record_remote_miss();

        assert!((metrics.overall_hit_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_captures_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_load();
        metrics.record_load_failure();
        metrics.record_backfill();
        metrics.record_degraded_op();
        metrics.update_local_entries(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.load_failures, 1);
        assert_eq!(snapshot.backfills, 1);
        assert_eq!(snapshot.degraded_ops, 1);
        assert_eq!(snapshot.local_entries, 7);
    }

    #[test]
    fn test_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_local_hit();
        metrics.record_put();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.local_hits, 0);
        assert_eq!(snapshot.puts, 0);
    }
}
