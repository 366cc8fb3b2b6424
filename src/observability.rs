use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::workflows::WorkflowError;

/// Workflow usage counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub transitions_applied: AtomicU64,
    pub invalid_transitions: AtomicU64,
    pub unauthorized: AtomicU64,
    pub validation_failures: AtomicU64,
    pub other_failures: AtomicU64,
    pub version_conflicts: AtomicU64,
    pub cart_handoffs: AtomicU64,
    pub cart_failures: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.transitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, error: &WorkflowError) {
        let counter = match error {
            WorkflowError::InvalidTransition { .. } => &self.invalid_transitions,
            WorkflowError::Unauthorized { .. } => &self.unauthorized,
            WorkflowError::Validation(_) => &self.validation_failures,
            _ => &self.other_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.version_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cart_handoff(&self) {
        self.cart_handoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cart_failure(&self) {
        self.cart_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            invalid_transitions: self.invalid_transitions.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            other_failures: self.other_failures.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
            cart_handoffs: self.cart_handoffs.load(Ordering::Relaxed),
            cart_failures: self.cart_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            applied = stats.transitions_applied,
            invalid_transitions = stats.invalid_transitions,
            unauthorized = stats.unauthorized,
            validation_failures = stats.validation_failures,
            other_failures = stats.other_failures,
            conflicts = stats.version_conflicts,
            cart_handoffs = stats.cart_handoffs,
            cart_failures = stats.cart_failures,
            "Workflow metrics"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub transitions_applied: u64,
    pub invalid_transitions: u64,
    pub unauthorized: u64,
    pub validation_failures: u64,
    pub other_failures: u64,
    pub version_conflicts: u64,
    pub cart_handoffs: u64,
    pub cart_failures: u64,
}

/// Global metrics instance
static WORKFLOW_METRICS: std::sync::LazyLock<WorkflowMetrics> =
    std::sync::LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Create correlated spans for workflow operations
pub fn create_workflow_span(operation: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        workflow.operation = operation,
        correlation.id = correlation_id,
    )
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::{ActionKind, Role, Stage};

    #[test]
    fn test_rejections_are_bucketed_by_kind() {
        let metrics = WorkflowMetrics::new();
        metrics.record_rejected(&WorkflowError::InvalidTransition {
            from: Stage::Finished,
            action: ActionKind::Start,
        });
        metrics.record_rejected(&WorkflowError::Unauthorized {
            role: Role::Customer,
            operation: "assign".to_string(),
        });
        metrics.record_rejected(&WorkflowError::Validation("empty".to_string()));
        metrics.record_applied();
        metrics.record_conflict();

        let stats = metrics.get_stats();
        assert_eq!(stats.invalid_transitions, 1);
        assert_eq!(stats.unauthorized, 1);
        assert_eq!(stats.validation_failures, 1);
        assert_eq!(stats.transitions_applied, 1);
        assert_eq!(stats.version_conflicts, 1);
        assert_eq!(stats.other_failures, 0);
    }
}
