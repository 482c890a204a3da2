//! # Glucose-Check Telemetry
//!
//! Logging and metrics for the glucose check coordinator.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with env filter and plain or
//!   JSON console output
//! - **Noise filter**: scoped suppression of known third-party network noise
//! - **Metrics**: Prometheus counters for workflow and engine outcomes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gc_telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GC_SERVICE_NAME` | `glucose-check` | Service name in log lines |
//! | `GC_LOG_LEVEL` | `info` | Log level filter |
//! | `GC_JSON_LOGS` | `false` | JSON formatted output |
//! | `GC_NOISE_FILTER` | `true` | Drop known third-party noise |

#![warn(missing_docs)]

mod config;
pub mod metrics;
mod noise_filter;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ENGINE_BOOTSTRAPS,
    ENGINE_BOOTSTRAP_DURATION, ENGINE_INVALIDATIONS, OPERATIONS_COMMITTED, OPERATIONS_FAILED,
    OPERATIONS_REJECTED, OPERATIONS_STALE, OPERATIONS_STARTED, OPERATION_DURATION,
};
pub use noise_filter::{NoiseFilter, NoiseFilterGuard, DEFAULT_NOISE_PATTERNS};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Global subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    /// Metric registration failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// Dropping it uninstalls the noise filter.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;

    let noise = NoiseFilter::with_defaults();
    tracing_setup::init_tracing(config, &noise)?;
    let noise_guard = config.noise_filter.then(|| noise.install());

    Ok(TelemetryGuard {
        noise,
        _noise_guard: noise_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    noise: NoiseFilter,
    _noise_guard: Option<NoiseFilterGuard>,
    _metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// The noise filter attached to console output.
    pub fn noise_filter(&self) -> &NoiseFilter {
        &self.noise
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Increment a counter, optionally with label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Record a histogram observation, optionally with label values.
#[macro_export]
macro_rules! metric_observe {
    ($metric:expr, $value:expr) => {
        $metric.observe($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).observe($value)
    };
}
