//! # EIP Filter Test Suite
//!
//! Pipelines of real filter processes wired together through one
//! in-process broker.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Pipeline: spawn filters, send, collect, stop
//! └── integration/
//!     ├── pipelines.rs  # Multi-stage queue pipelines
//!     ├── topics.rs     # Topic fan-out and routing-key filtering
//!     └── failures.rs   # Malformed input, bad configuration, buffer loss
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p eip-tests
//!
//! # By category
//! cargo test -p eip-tests integration::topics::
//!
//! # Benchmarks
//! cargo bench -p eip-tests
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod harness;
pub mod integration;
