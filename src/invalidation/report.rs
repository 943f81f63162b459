//! Eviction Reporting
//!
//! Each processed event produces one `EvictionReport` summarizing its
//! fan-out: what triggered it and how many per-user evictions succeeded
//! or failed. Reports are observability output, never control flow.

use parking_lot::RwLock;
use tracing::{info, warn};

/// Outcome summary of one invalidation fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionReport {
    /// What triggered the fan-out, e.g. `RolePermissionChanged role=admin`
    pub context: String,
    /// Evictions that completed
    pub success_count: usize,
    /// Evictions that failed; the affected users keep stale entries until
    /// their TTL elapses
    pub failure_count: usize,
}

impl EvictionReport {
    pub fn new(context: impl Into<String>, success_count: usize, failure_count: usize) -> Self {
        Self {
            context: context.into(),
            success_count,
            failure_count,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count == 0
    }
}

impl std::fmt::Display for EvictionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} evicted, {} failed",
            self.context, self.success_count, self.failure_count
        )
    }
}

// =============================================================================
// Report Sinks
// =============================================================================

/// Destination for eviction reports
pub trait ReportSink: Send + Sync {
    fn record(&self, report: EvictionReport);
}

/// Sink that logs each report
#[derive(Debug, Clone, Default)]
pub struct LoggingReportSink;

impl LoggingReportSink {
    pub fn new() -> Self {
        Self
    }
}

impl ReportSink for LoggingReportSink {
    fn record(&self, report: EvictionReport) {
        if report.is_clean() {
            info!(
                context = %report.context,
                evicted = report.success_count,
                "cache invalidation completed"
            );
        } else {
            warn!(
                context = %report.context,
                evicted = report.success_count,
                failed = report.failure_count,
                "cache invalidation completed with failures"
            );
        }
    }
}

/// Sink that collects reports in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct CollectingReportSink {
    reports: RwLock<Vec<EvictionReport>>,
}

impl CollectingReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected reports
    pub fn reports(&self) -> Vec<EvictionReport> {
        self.reports.read().clone()
    }

    pub fn last(&self) -> Option<EvictionReport> {
        self.reports.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }

    pub fn clear(&self) {
        self.reports.write().clear();
    }
}

impl ReportSink for CollectingReportSink {
    fn record(&self, report: EvictionReport) {
        self.reports.write().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let report = EvictionReport::new("RolePermissionChanged role=admin", 3, 1);
        assert_eq!(report.total(), 4);
        assert!(!report.is_clean());

        let clean = EvictionReport::new("UserRoleAssigned user=u1 role=admin", 1, 0);
        assert!(clean.is_clean());
    }

    #[test]
    fn test_report_display() {
        let report = EvictionReport::new("RolePermissionChanged role=admin", 2, 1);
        assert_eq!(
            report.to_string(),
            "RolePermissionChanged role=admin: 2 evicted, 1 failed"
        );
    }

    #[test]
    fn test_collecting_sink_accumulates() {
        let sink = CollectingReportSink::new();
        assert!(sink.is_empty());

        sink.record(EvictionReport::new("a", 1, 0));
        sink.record(EvictionReport::new("b", 2, 1));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.last().unwrap().context, "b");

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_logging_sink_accepts_reports() {
        let sink = LoggingReportSink::new();
        sink.record(EvictionReport::new("a", 1, 0));
        sink.record(EvictionReport::new("b", 0, 2));
    }
}
