//! # In-Memory Broker
//!
//! An in-process queue/topic broker implementing [`PipeConnector`] and
//! [`PipeTransport`] with the semantics the filters rely on:
//!
//! - queues are FIFO with competing consumers and manual acknowledgment;
//! - topic exchanges copy a message into every bound queue whose binding
//!   pattern matches the routing key;
//! - unacknowledged deliveries stay in broker custody until acked or nacked,
//!   and go back to the head of their queue when the consuming channel drops;
//! - exclusive queues are deleted when the channel that declared them drops.
//!
//! Every address resolves to the same broker, so filters wired together in one
//! process see each other's pipes. Suitable for tests and single-process
//! pipelines; distributed deployments use a real broker connector.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::topic;
use crate::transport::{
    DeliveryStream, DeliveryTag, ExchangeKind, PipeConnector, PipeTransport, QueueOptions,
    RawDelivery, TransportError, DEFAULT_EXCHANGE,
};

/// Cloneable handle to one in-process broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    topology: Mutex<Topology>,
    closed: AtomicBool,
    fail_publish: AtomicBool,
    unreachable: Mutex<HashSet<String>>,
    next_tag: AtomicU64,
    next_queue: AtomicU64,
    next_channel: AtomicU64,
    published: AtomicU64,
    dead_lettered: AtomicU64,
}

#[derive(Default)]
struct Topology {
    queues: HashMap<String, QueueState>,
    exchanges: HashMap<String, ExchangeKind>,
    bindings: Vec<Binding>,
    unacked: HashMap<DeliveryTag, Unacked>,
}

struct QueueState {
    options: QueueOptions,
    messages: VecDeque<StoredMessage>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn new(options: QueueOptions) -> Self {
        Self {
            options,
            messages: VecDeque::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn push_back(&mut self, message: StoredMessage) {
        self.messages.push_back(message);
        self.notify.notify_one();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    queue: String,
    exchange: String,
    pattern: String,
}

#[derive(Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    exchange: String,
    routing_key: String,
    redelivered: bool,
}

struct Unacked {
    channel: u64,
    queue: String,
    message: StoredMessage,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel directly, bypassing the connector's address check.
    #[must_use]
    pub fn channel(&self) -> Arc<dyn PipeTransport> {
        Arc::new(InMemoryChannel {
            id: self.inner.next_channel.fetch_add(1, Ordering::Relaxed),
            broker: Arc::clone(&self.inner),
            exclusive: Mutex::new(Vec::new()),
        })
    }

    /// Make connections to `address` fail (simulates an unreachable broker).
    pub fn set_unreachable(&self, address: impl Into<String>) {
        self.inner.unreachable.lock().insert(address.into());
    }

    /// Make every subsequent publish fail with a channel error.
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Close the broker: consumers' streams end and further calls fail.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let topology = self.inner.topology.lock();
        for queue in topology.queues.values() {
            queue.notify.notify_waiters();
            queue.notify.notify_one();
        }
    }

    /// Place a payload on a queue, declaring it (durable) if needed.
    pub fn enqueue(&self, queue: &str, payload: impl Into<Vec<u8>>) {
        let mut topology = self.inner.topology.lock();
        topology
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| QueueState::new(QueueOptions::durable()))
            .push_back(StoredMessage {
                payload: payload.into(),
                exchange: DEFAULT_EXCHANGE.to_string(),
                routing_key: queue.to_string(),
                redelivered: false,
            });
    }

    /// Remove and return every ready message on a queue.
    #[must_use]
    pub fn drain_queue(&self, queue: &str) -> Vec<Vec<u8>> {
        let mut topology = self.inner.topology.lock();
        topology
            .queues
            .get_mut(queue)
            .map(|q| q.messages.drain(..).map(|m| m.payload).collect())
            .unwrap_or_default()
    }

    /// Ready (not yet delivered) messages on a queue.
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner
            .topology
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.messages.len())
    }

    /// Whether a queue is currently declared.
    #[must_use]
    pub fn has_queue(&self, queue: &str) -> bool {
        self.inner.topology.lock().queues.contains_key(queue)
    }

    /// Whether an exchange is currently declared.
    #[must_use]
    pub fn has_exchange(&self, exchange: &str) -> bool {
        self.inner.topology.lock().exchanges.contains_key(exchange)
    }

    /// Number of queues bound to an exchange.
    #[must_use]
    pub fn binding_count(&self, exchange: &str) -> usize {
        self.inner
            .topology
            .lock()
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .count()
    }

    /// Deliveries handed out but not yet acked or nacked.
    #[must_use]
    pub fn unacked_count(&self) -> usize {
        self.inner.topology.lock().unacked.len()
    }

    /// Successful publish calls.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Deliveries rejected without requeue.
    #[must_use]
    pub fn dead_lettered_count(&self) -> u64 {
        self.inner.dead_lettered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PipeConnector for InMemoryBroker {
    async fn connect(&self, address: &str) -> Result<Arc<dyn PipeTransport>, TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.inner.unreachable.lock().contains(address) {
            return Err(TransportError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        debug!(address, "In-memory channel opened");
        Ok(self.channel())
    }
}

/// One channel onto an [`InMemoryBroker`].
struct InMemoryChannel {
    id: u64,
    broker: Arc<BrokerState>,
    /// Exclusive queues declared by this channel.
    exclusive: Mutex<Vec<String>>,
}

impl InMemoryChannel {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.broker.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn settle(&self, tag: DeliveryTag) -> Result<Unacked, TransportError> {
        self.ensure_open()?;
        self.broker
            .topology
            .lock()
            .unacked
            .remove(&tag)
            .ok_or(TransportError::UnknownDeliveryTag(tag.0))
    }
}

impl Drop for InMemoryChannel {
    fn drop(&mut self) {
        let owned = std::mem::take(&mut *self.exclusive.lock());
        let mut topology = self.broker.topology.lock();

        let mut pending: Vec<DeliveryTag> = topology
            .unacked
            .iter()
            .filter(|(_, unacked)| unacked.channel == self.id)
            .map(|(tag, _)| *tag)
            .collect();
        // Newest first, so the oldest ends up at the head of its queue.
        pending.sort_unstable_by(|a, b| b.cmp(a));
        let requeued = pending.len();
        for tag in pending {
            let Some(Unacked { queue, mut message, .. }) = topology.unacked.remove(&tag) else {
                continue;
            };
            if let Some(state) = topology.queues.get_mut(&queue) {
                message.redelivered = true;
                state.messages.push_front(message);
                state.notify.notify_one();
            }
        }
        if requeued > 0 {
            debug!(channel = self.id, requeued, "Unacked deliveries requeued with channel");
        }

        if owned.is_empty() {
            return;
        }
        for queue in &owned {
            if let Some(state) = topology.queues.remove(queue) {
                state.notify.notify_waiters();
                state.notify.notify_one();
            }
        }
        topology.bindings.retain(|b| !owned.contains(&b.queue));
        debug!(queues = owned.len(), "Exclusive queues deleted with channel");
    }
}

#[async_trait]
impl PipeTransport for InMemoryChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, TransportError> {
        self.ensure_open()?;
        let name = if name.is_empty() {
            let n = self.broker.next_queue.fetch_add(1, Ordering::Relaxed) + 1;
            format!("amq.gen-{n}")
        } else {
            name.to_string()
        };

        let mut topology = self.broker.topology.lock();
        if let Some(existing) = topology.queues.get(&name) {
            if existing.options.exclusive && !self.exclusive.lock().contains(&name) {
                return Err(TransportError::channel(
                    "declare_queue",
                    format!("queue '{name}' is exclusive to another channel"),
                ));
            }
            return Ok(name);
        }

        topology
            .queues
            .insert(name.clone(), QueueState::new(options));
        if options.exclusive {
            self.exclusive.lock().push(name.clone());
        }
        debug!(queue = %name, durable = options.durable, exclusive = options.exclusive, "Queue declared");
        Ok(name)
    }

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), TransportError> {
        self.ensure_open()?;
        if name.is_empty() {
            return Err(TransportError::channel(
                "declare_exchange",
                "the default exchange cannot be redeclared",
            ));
        }
        let mut topology = self.broker.topology.lock();
        match topology.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(TransportError::channel(
                "declare_exchange",
                format!("exchange '{name}' already declared as {existing:?}"),
            )),
            Some(_) => Ok(()),
            None => {
                topology.exchanges.insert(name.to_string(), kind);
                debug!(exchange = name, kind = ?kind, "Exchange declared");
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut topology = self.broker.topology.lock();
        if !topology.queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }
        if !topology.exchanges.contains_key(exchange) {
            return Err(TransportError::UnknownExchange(exchange.to_string()));
        }
        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            pattern: routing_key.to_string(),
        };
        if !topology.bindings.contains(&binding) {
            topology.bindings.push(binding);
        }
        debug!(queue, exchange, routing_key, "Queue bound");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, TransportError> {
        self.ensure_open()?;
        if !self.broker.topology.lock().queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }

        let state = ConsumeState {
            channel: self.id,
            broker: Arc::clone(&self.broker),
            queue: queue.to_string(),
        };
        let deliveries = stream::unfold(state, |state| async move {
            let delivery = state.next_delivery().await?;
            Some((Ok(delivery), state))
        });
        Ok(Box::pin(deliveries))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.broker.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::channel("publish", "broker refused message"));
        }

        let message = StoredMessage {
            payload: payload.to_vec(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            redelivered: false,
        };
        let mut topology = self.broker.topology.lock();

        if exchange == DEFAULT_EXCHANGE {
            match topology.queues.get_mut(routing_key) {
                Some(queue) => queue.push_back(message),
                None => warn!(queue = routing_key, "Unroutable message discarded (no such queue)"),
            }
        } else {
            if !topology.exchanges.contains_key(exchange) {
                return Err(TransportError::UnknownExchange(exchange.to_string()));
            }
            let mut targets: Vec<String> = Vec::new();
            for binding in topology.bindings.iter().filter(|b| b.exchange == exchange) {
                if topic::matches(&binding.pattern, routing_key) && !targets.contains(&binding.queue)
                {
                    targets.push(binding.queue.clone());
                }
            }
            if targets.is_empty() {
                debug!(exchange, routing_key, "No bound queue matched; message discarded");
            }
            for target in targets {
                if let Some(queue) = topology.queues.get_mut(&target) {
                    queue.push_back(message.clone());
                }
            }
        }

        self.broker.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), TransportError> {
        self.settle(tag).map(|_| ())
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), TransportError> {
        let Unacked { queue, mut message, .. } = self.settle(tag)?;
        if !requeue {
            self.broker.dead_lettered.fetch_add(1, Ordering::Relaxed);
            debug!(%tag, queue = %queue, "Delivery rejected");
            return Ok(());
        }
        let mut topology = self.broker.topology.lock();
        if let Some(state) = topology.queues.get_mut(&queue) {
            message.redelivered = true;
            state.messages.push_front(message);
            state.notify.notify_one();
        }
        Ok(())
    }
}

struct ConsumeState {
    channel: u64,
    broker: Arc<BrokerState>,
    queue: String,
}

impl ConsumeState {
    /// Wait for the next message; `None` once the broker closes or the
    /// queue is deleted.
    async fn next_delivery(&self) -> Option<RawDelivery> {
        loop {
            let notify = {
                if self.broker.closed.load(Ordering::SeqCst) {
                    return None;
                }
                let mut topology = self.broker.topology.lock();
                let queue = topology.queues.get_mut(&self.queue)?;
                match queue.messages.pop_front() {
                    Some(message) => {
                        let tag =
                            DeliveryTag(self.broker.next_tag.fetch_add(1, Ordering::Relaxed) + 1);
                        let delivery = RawDelivery {
                            tag,
                            payload: message.payload.clone(),
                            exchange: message.exchange.clone(),
                            routing_key: message.routing_key.clone(),
                            redelivered: message.redelivered,
                        };
                        topology.unacked.insert(
                            tag,
                            Unacked {
                                channel: self.channel,
                                queue: self.queue.clone(),
                                message,
                            },
                        );
                        return Some(delivery);
                    }
                    None => Arc::clone(&queue.notify),
                }
            };
            notify.notified().await;
        }
    }
}
