//! # Glucose-Check Runtime
//!
//! Interactive entry point. Reads commands from stdin; type `help` for the
//! list. Workflows run in the background, so `network` and `account` can be
//! issued while a `submit` or `check` is still waiting on the ledger.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gc_runtime::{Command, GlucoseRuntime, RuntimeConfig, HELP};
use gc_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and metrics
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry = init_telemetry(&telemetry_config).context("Failed to initialize telemetry")?;

    // Load configuration
    let config = RuntimeConfig::from_env().context("Failed to load runtime configuration")?;

    let runtime = GlucoseRuntime::new(config);
    runtime.prepare();
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        };
        let Some(line) = line else {
            info!("End of input");
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match runtime.execute(command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!(error = %e, "Command failed"),
        }
    }

    runtime.shutdown().await;
    Ok(())
}
