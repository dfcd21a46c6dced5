//! # EIP-02 Routing
//!
//! Content-based router, recipient list and message filter.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): Pure routing decisions
//!   - `RoutingTable`: ordered `(condition, destination)` rules plus a default
//!   - `RoutingMode`: `single` (first match) or `multiple` (all matches)
//!   - `GateRules`: conjunction of conditions for the message filter
//!
//! - **Service Layer** (`service/`): `MessageFilter` implementations
//!   - `ContentRouter`: forwards the input envelope to routed destinations
//!   - `PredicateFilter`: forwards only admitted messages
//!
//! ## Invariants
//!
//! - Rules are evaluated in declared order; in single mode the first true
//!   rule wins.
//! - In multiple mode destinations are reported in rule order with duplicates
//!   suppressed; the default is used only when nothing matched.
//! - An unroutable message is dropped and acknowledged, never retried.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod service;

// Re-exports for convenience
pub use domain::{GateRule, GateRules, RoutingConfig, RoutingMode, RoutingTable, Rule};
pub use service::{ContentRouter, PredicateFilter};
