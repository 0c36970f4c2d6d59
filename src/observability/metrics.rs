//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `kube_secret_pipe_reconciliations_total` - Total number of reconciliation passes
//! - `kube_secret_pipe_publishes_total` - Successful output writes, by operation (create/update)
//! - `kube_secret_pipe_publish_errors_total` - Failed output writes, by operation
//! - `kube_secret_pipe_render_failures_total` - Template keys dropped because they failed to render
//! - `kube_secret_pipe_watch_streams_closed_total` - Watches that ended, by object kind
//! - `kube_secret_pipe_targets_running` - Targets whose update loop is running

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kube_secret_pipe_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static PUBLISHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_pipe_publishes_total",
            "Total number of output Secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PUBLISHES_TOTAL metric - this should never happen")
});

static PUBLISH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_pipe_publish_errors_total",
            "Total number of failed output Secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PUBLISH_ERRORS_TOTAL metric - this should never happen")
});

static RENDER_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kube_secret_pipe_render_failures_total",
        "Total number of template keys that failed to parse or execute",
    )
    .expect("Failed to create RENDER_FAILURES_TOTAL metric - this should never happen")
});

static WATCH_STREAMS_CLOSED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_pipe_watch_streams_closed_total",
            "Total number of watch streams that ended by object kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_STREAMS_CLOSED_TOTAL metric - this should never happen")
});

static TARGETS_RUNNING: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "kube_secret_pipe_targets_running",
        "Current number of targets with a running update loop",
    )
    .expect("Failed to create TARGETS_RUNNING metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PUBLISHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PUBLISH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RENDER_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_STREAMS_CLOSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGETS_RUNNING.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_publishes(operation: &str) {
    PUBLISHES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_publish_errors(operation: &str) {
    PUBLISH_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_render_failures(count: usize) {
    RENDER_FAILURES_TOTAL.inc_by(count as u64);
}

pub fn increment_watch_streams_closed(kind: &str) {
    WATCH_STREAMS_CLOSED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_targets_running() {
    TARGETS_RUNNING.inc();
}

pub fn decrement_targets_running() {
    TARGETS_RUNNING.dec();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&REGISTRY.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("kube_secret_pipe_reconciliations_total"));
        assert!(text.contains("kube_secret_pipe_targets_running"));
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        let after = RECONCILIATIONS_TOTAL.get();
        assert!(after > before);
    }

    #[test]
    fn test_increment_publishes_by_operation() {
        let before = PUBLISHES_TOTAL.with_label_values(&["metrics-test"]).get();
        increment_publishes("metrics-test");
        increment_publishes("metrics-test");
        let after = PUBLISHES_TOTAL.with_label_values(&["metrics-test"]).get();
        assert_eq!(after, before + 2);
    }

    #[test]
    fn test_increment_render_failures_by_count() {
        let before = RENDER_FAILURES_TOTAL.get();
        increment_render_failures(3);
        assert!(RENDER_FAILURES_TOTAL.get() >= before + 3);
    }
}
