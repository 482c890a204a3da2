//! Subscriber setup: env filter, console output and noise filtering.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::noise_filter::NoiseFilter;
use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber.
///
/// The console layer sits behind `noise`; the filter only drops events while
/// it is installed.
pub fn init_tracing(config: &TelemetryConfig, noise: &NoiseFilter) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let console_layer = if config.console_output {
        let layer = if config.json_logs {
            // JSON output for containers/production
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            // Pretty output for development
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(true)
                .boxed()
        };
        Some(layer.with_filter(noise.clone()))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        noise_filter = config.noise_filter,
        "Tracing initialized"
    );

    Ok(())
}
