//! # Pipe Transport
//!
//! The minimal broker capability the filters need. Everything about
//! connection lifecycle, wire protocol and acknowledgment bookkeeping lives
//! behind these two traits.
//!
//! ```text
//! PipeConnector::connect(address) ──→ Arc<dyn PipeTransport>   (connection + channel)
//!                                          │
//!        declare_queue / declare_exchange / bind_queue
//!        consume(queue) ──→ DeliveryStream
//!        publish(exchange, routing_key, payload)
//!        ack(tag) / nack(tag, requeue)
//! ```
//!
//! Queues are published to through the default exchange (`""`) with the queue
//! name as routing key, the same convention AMQP brokers use.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_stream::Stream;

/// The default (direct-to-queue) exchange.
pub const DEFAULT_EXCHANGE: &str = "";

/// Transport failures. All of them are fatal to the owning runner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not connect to the broker.
    #[error("Connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// Channel-level failure (declare, bind, consume, publish).
    #[error("Channel error during {operation}: {reason}")]
    Channel { operation: String, reason: String },

    /// Publishing to an exchange that was never declared.
    #[error("Exchange not found: {0}")]
    UnknownExchange(String),

    /// Consuming or binding a queue that was never declared.
    #[error("Queue not found: {0}")]
    UnknownQueue(String),

    /// Acknowledging a delivery the broker does not know (double ack).
    #[error("Unknown delivery tag: {0}")]
    UnknownDeliveryTag(u64),

    /// The broker connection was closed.
    #[error("Broker connection closed")]
    Closed,
}

impl TransportError {
    /// Shorthand for [`TransportError::Channel`].
    pub fn channel(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Channel {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Broker-assigned delivery identifier, unique per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(pub u64);

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message as handed out by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDelivery {
    /// Tag to acknowledge with.
    pub tag: DeliveryTag,
    /// Message body.
    pub payload: Vec<u8>,
    /// Exchange the message was published to (`""` for direct-to-queue).
    pub exchange: String,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Whether the broker delivered this message before.
    pub redelivered: bool,
}

/// Lazy, unbounded stream of deliveries from one queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<RawDelivery, TransportError>> + Send>>;

/// Exchange types used by pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Routing-key pattern matching (`*` / `#`).
    Topic,
}

/// Options for queue declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueOptions {
    /// Survives broker restarts.
    pub durable: bool,
    /// Owned by this connection and deleted with it.
    pub exclusive: bool,
}

impl QueueOptions {
    /// Durable, shared queue (named pipes).
    #[must_use]
    pub fn durable() -> Self {
        Self {
            durable: true,
            exclusive: false,
        }
    }

    /// Exclusive, non-durable queue (anonymous topic subscriptions).
    #[must_use]
    pub fn exclusive() -> Self {
        Self {
            durable: false,
            exclusive: true,
        }
    }
}

/// An open channel to a broker.
#[async_trait]
pub trait PipeTransport: Send + Sync {
    /// Declare a queue (idempotent). An empty name asks the broker to
    /// generate one; the actual name is returned.
    async fn declare_queue(&self, name: &str, options: QueueOptions)
        -> Result<String, TransportError>;

    /// Declare an exchange (idempotent).
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), TransportError>;

    /// Bind a queue to an exchange with a routing-key pattern.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), TransportError>;

    /// Start consuming from a queue with manual acknowledgment.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, TransportError>;

    /// Publish a payload.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Acknowledge a delivery.
    async fn ack(&self, tag: DeliveryTag) -> Result<(), TransportError>;

    /// Reject a delivery, optionally putting it back on its queue.
    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), TransportError>;
}

/// Opens channels to brokers by address.
#[async_trait]
pub trait PipeConnector: Send + Sync {
    /// Connect to `address` and open one channel.
    async fn connect(&self, address: &str) -> Result<Arc<dyn PipeTransport>, TransportError>;
}
