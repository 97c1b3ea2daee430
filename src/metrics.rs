//! Metrics collection for runs
//!
//! Prometheus-compatible metrics for run outcomes, run durations, batch item
//! outcomes and controller state transitions. Everything registers in the
//! default registry, so [`export_metrics`] renders it alongside whatever else
//! the host process registers.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::control::ExecutionState;
use crate::Result;

lazy_static! {
    /// Counter for finished runs
    static ref RUNS: IntCounterVec = register_int_counter_vec!(
        "taskctl_runs_total",
        "Total number of finished runs",
        &["runner", "state"]
    ).unwrap();

    /// Histogram for run duration
    static ref RUN_DURATION: HistogramVec = register_histogram_vec!(
        "taskctl_run_duration_seconds",
        "Run duration in seconds",
        &["runner"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    /// Gauge for runs in flight
    static ref ACTIVE_RUNS: IntGauge = register_int_gauge!(
        "taskctl_active_runs",
        "Number of runs currently in flight"
    ).unwrap();

    /// Counter for batch item outcomes
    static ref BATCH_ITEMS: IntCounterVec = register_int_counter_vec!(
        "taskctl_batch_items_total",
        "Total number of batch item invocations by outcome",
        &["status"]
    ).unwrap();

    /// Counter for controller transitions
    static ref TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "taskctl_controller_transitions_total",
        "Controller state transitions",
        &["from_state", "to_state"]
    ).unwrap();
}

/// Metrics collector for one runner kind
pub struct MetricsCollector {
    runner: &'static str,
}

impl MetricsCollector {
    /// Create a collector labelled with the runner kind
    pub fn new(runner: &'static str) -> Self {
        Self { runner }
    }

    /// Record a run entering the lifecycle
    pub fn record_run_start(&self) {
        ACTIVE_RUNS.inc();
    }

    /// Record a run leaving the lifecycle
    pub fn record_run_end(&self, state: ExecutionState, duration: f64) {
        ACTIVE_RUNS.dec();
        RUNS.with_label_values(&[self.runner, state.as_str()]).inc();
        RUN_DURATION
            .with_label_values(&[self.runner])
            .observe(duration);
    }

    /// Record one batch item outcome (`completed`, `failed` or `cancelled`)
    pub fn record_batch_item(status: &str) {
        BATCH_ITEMS.with_label_values(&[status]).inc();
    }

    /// Record a controller state transition
    pub fn record_transition(from: ExecutionState, to: ExecutionState) {
        TRANSITIONS
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }
}

/// Render every registered metric in the Prometheus text format
pub fn export_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics are not valid UTF-8: {e}")).into())
}
