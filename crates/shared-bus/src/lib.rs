//! # Shared Bus - Pipes over a Queue/Topic Broker
//!
//! Everything a filter needs to read from and write to pipes.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────┐  open_consumer()   ┌──────────────┐  declare/bind/consume  ┌──────────────┐
//! │ FilterRunner │ ─────────────────→ │ PipeEndpoint │ ─────────────────────→ │ PipeTransport│
//! │              │ ←── Delivery ───── │              │ ←── RawDelivery ────── │  (broker)    │
//! │              │  publish()         │              │  publish/ack/nack      │              │
//! └──────────────┘                    └──────────────┘                        └──────────────┘
//! ```
//!
//! - [`transport`]: the broker capability ([`PipeConnector`], [`PipeTransport`]).
//! - [`endpoint`]: descriptor-driven setup, lazy declaration, move-only acks.
//! - [`memory`]: in-process broker used by tests and single-process pipelines.
//! - `amqp` (feature `amqp`): RabbitMQ connector.
//!
//! ## Failure Model
//!
//! Transport errors are never retried here. Callers treat them as fatal and
//! leave restarts to the process supervisor.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod endpoint;
pub mod memory;
pub mod topic;
pub mod transport;

// Re-export main types
#[cfg(feature = "amqp")]
pub use amqp::AmqpConnector;
pub use endpoint::{AckHandle, Consumer, Delivery, PipeEndpoint};
pub use memory::InMemoryBroker;
pub use transport::{
    DeliveryStream, DeliveryTag, ExchangeKind, PipeConnector, PipeTransport, QueueOptions,
    RawDelivery, TransportError, DEFAULT_EXCHANGE,
};
