//! # Shared Types Crate
//!
//! The data model every filter shares: the CloudEvents-shaped
//! [`MessageEnvelope`], dotted [`FieldPath`]s into message data, broker
//! [`PipeDescriptor`]s, the [`MessageFilter`] contract and the error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-crate types are defined here.
//! - **Absent is not an error**: every path operation on `data` reports
//!   "not found" instead of failing.
//! - **New output, new envelope**: filters that derive content build a fresh
//!   envelope; only the content filter edits `data` in place.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod errors;
pub mod field_path;
pub mod filter;
pub mod pipe;

pub use envelope::{EnvelopeIdentity, MessageEnvelope, SPEC_VERSION};
pub use errors::*;
pub use field_path::{FieldPath, Segment};
pub use filter::{Destination, Disposition, DropReason, Emission, MessageFilter};
pub use pipe::{
    PipeDescriptor, PipeKind, PipeRole, DEFAULT_INPUT_ROUTING_KEY, DEFAULT_OUTPUT_ROUTING_KEY,
};
