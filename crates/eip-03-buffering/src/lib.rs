//! # EIP-03 Buffering
//!
//! Stateful, count-triggered filters: the **Aggregator** (group and merge)
//! and the **Resequencer** (group, sort, release individually).
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`)
//!   - `BufferState`: ordered messages plus a non-zero threshold
//!   - `BatchStrategy`: admission and flush rules of one specialization
//!   - `Aggregator`, `Resequencer`: the two strategies
//!
//! - **Filter** (`filter.rs`): `BufferingFilter<S>` implements
//!   `MessageFilter` for any strategy
//!
//! ## Invariants
//!
//! - The buffer flushes exactly when its length reaches the threshold and is
//!   empty immediately afterwards.
//! - Only admitted messages count toward the threshold.
//! - Buffer state is owned by one filter value; it is never shared and never
//!   persisted.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod domain;
pub mod filter;

// Re-exports for convenience
pub use config::{AggregatorConfig, ResequencerConfig};
pub use domain::{
    Aggregator, BatchStrategy, BufferState, Resequencer, SortKey, AGGREGATE_FIELD,
};
pub use filter::{AggregatorFilter, BufferingFilter, ResequencerFilter};
