//! # Integration Flows
//!
//! Each test wires real filter processes through one in-process broker and
//! observes only what arrives on pipes, as a downstream consumer would.

pub mod failures;
pub mod pipelines;
pub mod topics;
