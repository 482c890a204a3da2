//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to drop known third-party noise from log output
    pub noise_filter: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "glucose-check".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            noise_filter: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GC_SERVICE_NAME`: Service name (default: glucose-check)
    /// - `GC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `GC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `GC_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `GC_NOISE_FILTER`: Drop known third-party noise (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("GC_SERVICE_NAME")
                .unwrap_or_else(|_| "glucose-check".to_string()),

            log_level: env::var("GC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("GC_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("GC_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            noise_filter: env::var("GC_NOISE_FILTER")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value != "false" && value != "0" && value != "off" && !value.is_empty()
}
