//! # EIP-01 Rule Engine
//!
//! A closed-grammar expression language for routing, filtering and field
//! extraction over message envelopes.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `lexer`: tokens with source offsets
//!   - `parser`: recursive descent into a tagged-variant AST
//!   - `eval`: fail-closed, three-valued evaluator
//!
//! - **Engine** (`engine.rs`): `RuleEngine` (limits, entry points) and the
//!   compiled `Condition`
//!
//! ## Sandbox
//!
//! Conditions come from externally supplied configuration. The language can
//! only read the message under evaluation: there are no assignments, loops,
//! host calls or user-defined functions, and the source length and nesting
//! depth are bounded at compile time.
//!
//! ## Invariants
//!
//! - A reference to an absent field never raises; any comparison touching it
//!   is unknown and a predicate that ends unknown is `false`.
//! - Evaluation is total: every compiled condition evaluates without panicking.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use domain::{Expr, Function};
pub use engine::{Condition, EngineLimits, RuleEngine, MAX_EXPRESSION_BYTES, MAX_NESTING_DEPTH};
pub use error::RuleError;
