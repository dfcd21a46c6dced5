//! # Pipe Endpoint
//!
//! Translates a [`PipeDescriptor`] plus a role into broker setup calls:
//!
//! | Kind  | Consumer                                              | Producer                          |
//! |-------|-------------------------------------------------------|-----------------------------------|
//! | Queue | declare durable queue `name`, consume it              | declare queue, publish via `""`    |
//! | Topic | declare exchange, exclusive anonymous queue bound     | declare exchange, publish with    |
//! |       | with the routing key, consume the anonymous queue     | the descriptor's routing key      |
//!
//! One channel is opened per broker address and reused. Producer-side
//! declaration happens lazily on first publish and is remembered, so it is
//! idempotent and costs one round-trip per destination.
//!
//! Every [`Delivery`] carries a move-only [`AckHandle`]: acknowledging or
//! rejecting consumes it, so a delivery cannot be settled twice.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{PipeDescriptor, PipeKind};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::transport::{
    DeliveryStream, DeliveryTag, ExchangeKind, PipeConnector, PipeTransport, QueueOptions,
    TransportError, DEFAULT_EXCHANGE,
};

/// Consumer/producer setup over any [`PipeConnector`].
pub struct PipeEndpoint {
    connector: Arc<dyn PipeConnector>,
    /// Open channel per broker address.
    channels: tokio::sync::Mutex<HashMap<String, Arc<dyn PipeTransport>>>,
    /// Producer destinations already declared: (address, kind, name).
    declared: Mutex<HashSet<(String, PipeKind, String)>>,
}

impl PipeEndpoint {
    /// Create an endpoint; no connection is made until first use.
    pub fn new(connector: Arc<dyn PipeConnector>) -> Self {
        Self {
            connector,
            channels: tokio::sync::Mutex::new(HashMap::new()),
            declared: Mutex::new(HashSet::new()),
        }
    }

    /// The channel for `address`, connecting on first use.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the broker is unreachable. There is no
    /// retry.
    pub async fn channel(&self, address: &str) -> Result<Arc<dyn PipeTransport>, TransportError> {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(address) {
            return Ok(Arc::clone(channel));
        }
        let channel = self.connector.connect(address).await?;
        info!(address, "Connected to broker");
        channels.insert(address.to_string(), Arc::clone(&channel));
        Ok(channel)
    }

    /// Start consuming from a pipe.
    ///
    /// A Queue is consumed directly. A Topic gets an exclusive anonymous queue
    /// bound to the exchange with the descriptor's routing key.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] from connecting, declaring, binding or
    /// consuming.
    pub async fn open_consumer(
        &self,
        descriptor: &PipeDescriptor,
    ) -> Result<Consumer, TransportError> {
        let channel = self.channel(&descriptor.address).await?;

        let queue = match descriptor.kind {
            PipeKind::Queue => {
                channel
                    .declare_queue(&descriptor.name, QueueOptions::durable())
                    .await?
            }
            PipeKind::Topic => {
                channel
                    .declare_exchange(&descriptor.name, ExchangeKind::Topic)
                    .await?;
                let queue = channel.declare_queue("", QueueOptions::exclusive()).await?;
                let routing_key = descriptor.routing_key().unwrap_or_default();
                channel
                    .bind_queue(&queue, &descriptor.name, routing_key)
                    .await?;
                queue
            }
        };

        let stream = channel.consume(&queue).await?;
        info!(pipe = %descriptor, queue = %queue, "Consuming");
        Ok(Consumer {
            descriptor: descriptor.clone(),
            queue,
            channel,
            stream,
        })
    }

    /// Publish a payload to a pipe, declaring the destination on first use.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] from connecting, declaring or publishing.
    pub async fn publish(
        &self,
        descriptor: &PipeDescriptor,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let channel = self.channel(&descriptor.address).await?;
        self.declare(channel.as_ref(), descriptor).await?;

        match descriptor.kind {
            PipeKind::Queue => {
                channel
                    .publish(DEFAULT_EXCHANGE, &descriptor.name, payload)
                    .await
            }
            PipeKind::Topic => {
                let routing_key = descriptor.routing_key().unwrap_or_default();
                channel
                    .publish(&descriptor.name, routing_key, payload)
                    .await
            }
        }
    }

    async fn declare(
        &self,
        channel: &dyn PipeTransport,
        descriptor: &PipeDescriptor,
    ) -> Result<(), TransportError> {
        let key = (
            descriptor.address.clone(),
            descriptor.kind,
            descriptor.name.clone(),
        );
        if self.declared.lock().contains(&key) {
            return Ok(());
        }

        match descriptor.kind {
            PipeKind::Queue => {
                channel
                    .declare_queue(&descriptor.name, QueueOptions::durable())
                    .await?;
            }
            PipeKind::Topic => {
                channel
                    .declare_exchange(&descriptor.name, ExchangeKind::Topic)
                    .await?;
            }
        }
        debug!(pipe = %descriptor, "Output declared");
        self.declared.lock().insert(key);
        Ok(())
    }
}

impl fmt::Debug for PipeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeEndpoint")
            .field("declared", &self.declared.lock().len())
            .finish_non_exhaustive()
    }
}

/// Lazy, unbounded sequence of deliveries from one input pipe.
pub struct Consumer {
    descriptor: PipeDescriptor,
    queue: String,
    channel: Arc<dyn PipeTransport>,
    stream: DeliveryStream,
}

impl Consumer {
    /// Wait for the next delivery. `None` means the broker ended the stream
    /// (connection closed); under normal operation it never does.
    pub async fn next(&mut self) -> Option<Result<Delivery, TransportError>> {
        let raw = match self.stream.next().await? {
            Ok(raw) => raw,
            Err(err) => return Some(Err(err)),
        };
        Some(Ok(Delivery {
            payload: raw.payload,
            routing_key: raw.routing_key,
            redelivered: raw.redelivered,
            handle: AckHandle {
                tag: raw.tag,
                channel: Arc::clone(&self.channel),
            },
        }))
    }

    /// The pipe this consumer reads.
    #[must_use]
    pub fn descriptor(&self) -> &PipeDescriptor {
        &self.descriptor
    }

    /// The broker queue actually consumed (anonymous for topics).
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("descriptor", &self.descriptor)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// One consumed message awaiting settlement.
#[derive(Debug)]
pub struct Delivery {
    /// Message body.
    pub payload: Vec<u8>,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Whether the broker delivered this message before.
    pub redelivered: bool,
    handle: AckHandle,
}

impl Delivery {
    /// Split into the payload and the settlement handle.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, AckHandle) {
        (self.payload, self.handle)
    }

    /// Acknowledge without inspecting further.
    ///
    /// # Errors
    ///
    /// See [`AckHandle::ack`].
    pub async fn ack(self) -> Result<(), TransportError> {
        self.handle.ack().await
    }
}

/// Settlement token for exactly one delivery.
pub struct AckHandle {
    tag: DeliveryTag,
    channel: Arc<dyn PipeTransport>,
}

impl AckHandle {
    /// Broker delivery tag.
    #[must_use]
    pub fn tag(&self) -> DeliveryTag {
        self.tag
    }

    /// Acknowledge: the message leaves broker custody.
    ///
    /// # Errors
    ///
    /// [`TransportError`] if the channel rejects the acknowledgment.
    pub async fn ack(self) -> Result<(), TransportError> {
        self.channel.ack(self.tag).await
    }

    /// Reject, optionally requeueing.
    ///
    /// # Errors
    ///
    /// [`TransportError`] if the channel rejects the call.
    pub async fn nack(self, requeue: bool) -> Result<(), TransportError> {
        self.channel.nack(self.tag, requeue).await
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle").field("tag", &self.tag).finish()
    }
}
