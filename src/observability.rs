use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Workflow engine usage metrics
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub loads: AtomicU64,
    pub stages_created: AtomicU64,
    pub decisions: AtomicU64,
    pub precondition_rejections: AtomicU64,
    pub repository_failures: AtomicU64,
    pub guard_contentions: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stage_created(&self) {
        self.stages_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_precondition_rejection(&self) {
        self.precondition_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repository_failure(&self) {
        self.repository_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_guard_contention(&self) {
        self.guard_contentions.fetch_add(1, Ordering::Relaxed);
        debug!("Mutation rejected, batch already busy");
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            loads: self.loads.load(Ordering::Relaxed),
            stages_created: self.stages_created.load(Ordering::Relaxed),
            decisions: self.decisions.load(Ordering::Relaxed),
            precondition_rejections: self.precondition_rejections.load(Ordering::Relaxed),
            repository_failures: self.repository_failures.load(Ordering::Relaxed),
            guard_contentions: self.guard_contentions.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            loads = stats.loads,
            stages_created = stats.stages_created,
            decisions = stats.decisions,
            precondition_rejections = stats.precondition_rejections,
            repository_failures = stats.repository_failures,
            guard_contentions = stats.guard_contentions,
            "Workflow engine metrics"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub loads: u64,
    pub stages_created: u64,
    pub decisions: u64,
    pub precondition_rejections: u64,
    pub repository_failures: u64,
    pub guard_contentions: u64,
}

/// Global metrics instance
static WORKFLOW_METRICS: std::sync::LazyLock<WorkflowMetrics> =
    std::sync::LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = WorkflowMetrics::new();
        metrics.record_load();
        metrics.record_load();
        metrics.record_stage_created();
        metrics.record_guard_contention();

        let stats = metrics.get_stats();
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.stages_created, 1);
        assert_eq!(stats.decisions, 0);
        assert_eq!(stats.guard_contentions, 1);
    }
}
