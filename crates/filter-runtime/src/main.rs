//! # EIP Filter Process
//!
//! Runs exactly one filter, configured from the environment.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics (`EIP_LOG_LEVEL`, `EIP_JSON_LOGS`, ...)
//! 2. Load `RuntimeConfig` (`EIP_FILTER`, `EIP_IN`, `EIP_OUT`, ...)
//! 3. Build the filter and bind the input pipe
//! 4. Process messages until Ctrl+C or the broker closes the stream
//!
//! Any configuration or broker error exits with a non-zero status; restarts
//! are the supervisor's job.

use std::sync::Arc;

use anyhow::{Context, Result};
use filter_runtime::{run_filter, RunOutcome, RuntimeConfig};
use filter_telemetry::{init_telemetry, TelemetryConfig};
use shared_bus::PipeConnector;
use tracing::{info, warn};

fn connector() -> Arc<dyn PipeConnector> {
    #[cfg(feature = "amqp")]
    {
        Arc::new(shared_bus::AmqpConnector::new())
    }
    #[cfg(not(feature = "amqp"))]
    {
        warn!("Built without the `amqp` feature; using the in-process broker");
        Arc::new(shared_bus::InMemoryBroker::new())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let kind = std::env::var("EIP_FILTER").unwrap_or_default();
    let telemetry = TelemetryConfig::for_filter(kind.trim());
    init_telemetry(&telemetry).context("failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("invalid filter configuration")?;
    info!(
        service = %telemetry.service_name,
        kind = %config.kind,
        "Filter process starting"
    );

    match run_filter(config, connector(), shutdown_signal()).await? {
        RunOutcome::Filtered(summary) => info!(
            consumed = summary.metrics.consumed,
            published = summary.metrics.published,
            dropped = summary.metrics.dropped,
            rejected = summary.metrics.rejected,
            discarded = summary.discarded,
            "Filter process exiting"
        ),
        RunOutcome::Sent(sent) => info!(sent, "Sender process exiting"),
    }
    Ok(())
}
