//! # Filter Telemetry
//!
//! Logging and metrics shared by every EIP filter process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filter_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::for_filter("aggregator"))?;
//!     // Filter runs here; logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EIP_SERVICE_NAME` | `eip-filter` | Service name in the startup log |
//! | `EIP_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `EIP_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `EIP_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
mod metrics;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, FilterMetrics, BUFFERED_MESSAGES, BUFFER_FLUSHES,
    MESSAGES_CONSUMED, MESSAGES_DROPPED, MESSAGES_PUBLISHED, MESSAGES_REJECTED,
    PROCESSING_DURATION, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}

/// Open the per-message span: filter name plus envelope id.
///
/// ```rust,ignore
/// let span = filter_telemetry::filter_span!("splitter", message.id);
/// let _entered = span.enter();
/// ```
#[macro_export]
macro_rules! filter_span {
    ($filter:expr, $id:expr) => {
        tracing::info_span!("message", filter = %$filter, id = %$id)
    };
}
