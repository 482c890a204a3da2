//! Prometheus metrics for the glucose check coordinator.
//!
//! All metrics follow the naming convention: `gc_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Histogram, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // WORKFLOW METRICS
    // =========================================================================

    /// Workflows that reached Running
    pub static ref OPERATIONS_STARTED: CounterVec = CounterVec::new(
        Opts::new("gc_operations_started_total", "Workflows that entered the running phase"),
        &["kind"]  // kind: submit/check
    ).expect("metric creation failed");

    /// Workflows whose result was committed
    pub static ref OPERATIONS_COMMITTED: CounterVec = CounterVec::new(
        Opts::new("gc_operations_committed_total", "Workflows whose result was committed"),
        &["kind"]
    ).expect("metric creation failed");

    /// Workflows discarded because the environment changed in flight
    pub static ref OPERATIONS_STALE: CounterVec = CounterVec::new(
        Opts::new("gc_operations_stale_total", "Workflow results discarded as stale"),
        &["kind"]
    ).expect("metric creation failed");

    /// Workflows that failed
    pub static ref OPERATIONS_FAILED: CounterVec = CounterVec::new(
        Opts::new("gc_operations_failed_total", "Workflows that ended in the failed phase"),
        &["kind", "error_type"]  // error_type: initialization/action
    ).expect("metric creation failed");

    /// Attempts refused before starting
    pub static ref OPERATIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("gc_operations_rejected_total", "Attempts refused before any phase transition"),
        &["kind", "reason"]  // reason: validation/busy/not_connected/no_submission
    ).expect("metric creation failed");

    /// End-to-end workflow duration
    pub static ref OPERATION_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gc_operation_duration_seconds",
            "Time from running to terminal phase"
        ).buckets(exponential_buckets(0.001, 2.0, 16).expect("valid buckets")),
        &["kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // ENGINE METRICS
    // =========================================================================

    /// Engine bootstrap attempts by outcome
    pub static ref ENGINE_BOOTSTRAPS: CounterVec = CounterVec::new(
        Opts::new("gc_engine_bootstraps_total", "Encryption engine bootstrap attempts"),
        &["outcome"]  // outcome: ready/error
    ).expect("metric creation failed");

    /// Engine invalidations caused by network changes
    pub static ref ENGINE_INVALIDATIONS: CounterVec = CounterVec::new(
        Opts::new("gc_engine_invalidations_total", "Engine instances torn down"),
        &["cause"]  // cause: network_change/explicit
    ).expect("metric creation failed");

    /// Engine bootstrap duration
    pub static ref ENGINE_BOOTSTRAP_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "gc_engine_bootstrap_duration_seconds",
            "Time spent bootstrapping the encryption engine"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Workflows
        Box::new(OPERATIONS_STARTED.clone()),
        Box::new(OPERATIONS_COMMITTED.clone()),
        Box::new(OPERATIONS_STALE.clone()),
        Box::new(OPERATIONS_FAILED.clone()),
        Box::new(OPERATIONS_REJECTED.clone()),
        Box::new(OPERATION_DURATION.clone()),
        // Engine
        Box::new(ENGINE_BOOTSTRAPS.clone()),
        Box::new(ENGINE_INVALIDATIONS.clone()),
        Box::new(ENGINE_BOOTSTRAP_DURATION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
