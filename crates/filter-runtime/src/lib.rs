//! # Filter Runtime Library
//!
//! Everything a filter process needs between its environment and the broker.
//! The entry point is the `filter-runtime` binary; this library exposes the
//! pieces for embedding and testing.
//!
//! ## Modules
//!
//! - `config` - `RuntimeConfig` and `FilterKind`, read from `EIP_*` variables
//! - `builder` - filter construction from configuration documents
//! - `runner` - the consume -> process -> publish -> acknowledge loop
//! - `outputs` - destination name resolution
//! - `taps` / `sender` - logger, receiver and sender
//! - `app` - process wiring
//!
//! ## Delivery Guarantees
//!
//! One message in flight per runner. A delivery is acknowledged only after
//! every emission it caused was published, so a crash before the ack leads to
//! redelivery (at-least-once). Messages held by a buffering filter have
//! already been acknowledged and are lost if the process stops (at-most-once).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod app;
pub mod builder;
pub mod config;
pub mod metrics;
pub mod outputs;
pub mod runner;
pub mod sender;
pub mod taps;

// Re-exports for convenience
pub use app::{run_filter, RunOutcome};
pub use builder::build_filter;
pub use config::{FilterKind, RuntimeConfig, DEFAULT_INTERVAL_MS};
pub use metrics::{RunnerMetrics, RunnerSnapshot};
pub use outputs::OutputSet;
pub use runner::{DecodePolicy, FilterRunner, RunSummary, RunnerError, RunnerState};
pub use sender::Sender;
pub use taps::{Receiver, WireTap};
