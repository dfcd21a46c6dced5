//! # Filter Runner
//!
//! The per-process control loop: bind the input pipe, then for each delivery
//! decode, process, publish and acknowledge before taking the next one.
//!
//! ## States
//!
//! ```text
//! Idle ─→ Connected ─→ Consuming ─→ Processing ─→ Publishing ─→ Acknowledging
//!                          ↑                                          │
//!                          └──────────────────────────────────────────┘
//!
//! any transport, configuration or fatal filter error ─→ Failed (terminal)
//! ```
//!
//! ## Failure Model
//!
//! Nothing is retried. A transport error, an unresolvable destination or a
//! fatal filter error stops the runner without acknowledging the current
//! delivery; the broker redelivers it to the next process. Unroutable and
//! filtered messages are acknowledged and dropped. Malformed payloads follow
//! the [`DecodePolicy`].
//!
//! Messages held in a buffering filter are lost when the runner stops; the
//! count is logged and exported as a gauge.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use filter_telemetry::{filter_span, FilterMetrics};
use shared_bus::{AckHandle, Consumer, PipeEndpoint, TransportError};
use shared_types::{
    ConfigurationError, DecodeError, Disposition, FilterError, MessageEnvelope, MessageFilter,
    PipeDescriptor,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use crate::metrics::{RunnerMetrics, RunnerSnapshot};
use crate::outputs::OutputSet;

/// Drop label for messages no routing rule accepted.
const UNROUTABLE: &str = "unroutable";

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Created, not connected.
    Idle,
    /// Broker channel open.
    Connected,
    /// Waiting for the next delivery.
    Consuming,
    /// Filter handling a message.
    Processing,
    /// Publishing emissions.
    Publishing,
    /// Settling the delivery with the broker.
    Acknowledging,
    /// Input stream ended or shutdown requested.
    Stopped,
    /// Terminal failure.
    Failed,
}

impl RunnerState {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerState::Idle => "idle",
            RunnerState::Connected => "connected",
            RunnerState::Consuming => "consuming",
            RunnerState::Processing => "processing",
            RunnerState::Publishing => "publishing",
            RunnerState::Acknowledging => "acknowledging",
            RunnerState::Stopped => "stopped",
            RunnerState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a payload that is not a valid envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Log, nack without requeue and continue.
    #[default]
    Reject,
    /// Stop the runner without settling the delivery.
    Fail,
}

impl FromStr for DecodePolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(DecodePolicy::Reject),
            "fail" => Ok(DecodePolicy::Fail),
            other => Err(ConfigurationError::invalid(
                "EIP_DECODE_POLICY",
                format!("expected 'reject' or 'fail', got '{other}'"),
            )),
        }
    }
}

/// Why a runner stopped.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration problem discovered while running.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Broker failure.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Malformed payload under [`DecodePolicy::Fail`].
    #[error("Malformed message: {0}")]
    Decode(#[from] DecodeError),

    /// Fatal filter error.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Final report of a runner that stopped cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Counters at shutdown.
    pub metrics: RunnerSnapshot,
    /// Messages still buffered (and therefore discarded).
    pub discarded: usize,
}

/// Drives one filter over one input pipe.
pub struct FilterRunner<F> {
    filter: F,
    endpoint: Arc<PipeEndpoint>,
    input: PipeDescriptor,
    outputs: OutputSet,
    decode_policy: DecodePolicy,
    metrics: Arc<RunnerMetrics>,
    telemetry: FilterMetrics,
    state: watch::Sender<RunnerState>,
}

impl<F: MessageFilter> FilterRunner<F> {
    /// Runner with the default decode policy.
    pub fn new(
        filter: F,
        endpoint: Arc<PipeEndpoint>,
        input: PipeDescriptor,
        outputs: OutputSet,
    ) -> Self {
        let telemetry = FilterMetrics::for_filter(filter.name());
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            filter,
            endpoint,
            input,
            outputs,
            decode_policy: DecodePolicy::default(),
            metrics: Arc::new(RunnerMetrics::new()),
            telemetry,
            state,
        }
    }

    /// Set the decode policy.
    #[must_use]
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Shared counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<RunnerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    /// Observe state changes from another task.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// The filter.
    #[must_use]
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Run until the input stream ends.
    pub async fn run(&mut self) -> Result<RunSummary, RunnerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until the input stream ends or `shutdown` resolves. Shutdown is only
    /// observed between messages, never mid-flight.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<RunSummary, RunnerError>
    where
        S: Future<Output = ()>,
    {
        let result = self.consume(shutdown).await;
        let discarded = self.filter.buffered();
        if discarded > 0 {
            warn!(
                filter = %self.filter.name(),
                discarded,
                "Runner stopping with buffered messages; they are lost"
            );
        }
        self.telemetry.set_buffered(discarded);

        match result {
            Ok(()) => {
                self.set_state(RunnerState::Stopped);
                info!(filter = %self.filter.name(), pipe = %self.input, "Runner stopped");
                Ok(RunSummary {
                    metrics: self.metrics.snapshot(),
                    discarded,
                })
            }
            Err(err) => {
                self.set_state(RunnerState::Failed);
                error!(filter = %self.filter.name(), error = %err, "Runner failed");
                Err(err)
            }
        }
    }

    async fn consume<S>(&mut self, shutdown: S) -> Result<(), RunnerError>
    where
        S: Future<Output = ()>,
    {
        self.endpoint.channel(&self.input.address).await?;
        self.set_state(RunnerState::Connected);

        let mut consumer: Consumer = self.endpoint.open_consumer(&self.input).await?;
        info!(
            filter = %self.filter.name(),
            pipe = %self.input,
            outputs = self.outputs.outputs().len(),
            "Runner consuming"
        );

        tokio::pin!(shutdown);
        loop {
            self.set_state(RunnerState::Consuming);
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(filter = %self.filter.name(), "Shutdown requested");
                    return Ok(());
                }
                next = consumer.next() => next,
            };

            let delivery = match next {
                Some(delivery) => delivery?,
                None => {
                    info!(filter = %self.filter.name(), "Input stream ended");
                    return Ok(());
                }
            };

            self.metrics.record_consumed();
            self.telemetry.consumed();
            let (payload, ack) = delivery.into_parts();
            self.handle(&payload, ack).await?;
        }
    }

    async fn handle(&mut self, payload: &[u8], ack: AckHandle) -> Result<(), RunnerError> {
        self.set_state(RunnerState::Processing);
        let message = match MessageEnvelope::from_slice(payload) {
            Ok(message) => message,
            Err(err) => return self.reject(err, ack).await,
        };

        let span = filter_span!(self.filter.name(), message.id);
        self.process(message, ack).instrument(span).await
    }

    async fn reject(&mut self, err: DecodeError, ack: AckHandle) -> Result<(), RunnerError> {
        match self.decode_policy {
            DecodePolicy::Fail => Err(err.into()),
            DecodePolicy::Reject => {
                warn!(filter = %self.filter.name(), error = %err, "Rejecting malformed payload");
                self.metrics.record_rejected();
                self.telemetry.rejected();
                self.set_state(RunnerState::Acknowledging);
                ack.nack(false).await?;
                Ok(())
            }
        }
    }

    async fn process(&mut self, message: MessageEnvelope, ack: AckHandle) -> Result<(), RunnerError> {
        let _timer = self.telemetry.start_timer();
        let flushes_before = self.filter.flushes();

        let disposition = match self.filter.process(message) {
            Ok(disposition) => disposition,
            Err(err) if !err.is_fatal() => {
                warn!(filter = %self.filter.name(), error = %err, "Dropping unroutable message");
                self.metrics.record_dropped();
                self.telemetry.dropped(UNROUTABLE);
                return self.acknowledge(ack).await;
            }
            Err(err) => return Err(err.into()),
        };

        let flushed = self.filter.flushes().saturating_sub(flushes_before);
        if flushed > 0 {
            self.metrics.record_flushes(flushed);
            self.telemetry.flushed(flushed);
        }
        self.telemetry.set_buffered(self.filter.buffered());

        match disposition {
            Disposition::Emit(emissions) => {
                self.set_state(RunnerState::Publishing);
                for emission in emissions {
                    let target = self.outputs.resolve(&emission.destination)?;
                    let body = emission.message.to_vec().map_err(|e| {
                        FilterError::Processing(format!(
                            "cannot encode envelope {}: {e}",
                            emission.message.id
                        ))
                    })?;
                    self.endpoint.publish(&target, &body).await?;
                    self.metrics.record_published();
                    self.telemetry.published(1);
                    debug!(
                        filter = %self.filter.name(),
                        id = %emission.message.id,
                        pipe = %target,
                        "Message published"
                    );
                }
            }
            Disposition::Held => {}
            Disposition::Dropped(reason) => {
                self.metrics.record_dropped();
                self.telemetry.dropped(reason.as_str());
            }
        }

        self.acknowledge(ack).await
    }

    async fn acknowledge(&mut self, ack: AckHandle) -> Result<(), RunnerError> {
        self.set_state(RunnerState::Acknowledging);
        ack.ack().await?;
        self.metrics.record_acknowledged();
        Ok(())
    }

    fn set_state(&self, state: RunnerState) {
        self.state.send_replace(state);
    }
}

impl<F: MessageFilter> fmt::Debug for FilterRunner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRunner")
            .field("filter", &self.filter.name())
            .field("input", &self.input)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eip_02_routing::{ContentRouter, RoutingTable};
    use eip_03_buffering::{AggregatorConfig, AggregatorFilter};
    use serde_json::{json, Value};
    use shared_bus::InMemoryBroker;
    use shared_types::EnvelopeIdentity;
    use std::time::Duration;

    use crate::taps::{Receiver, WireTap};

    const ADDR: &str = "amqp://broker";

    fn runner<F: MessageFilter>(
        broker: &InMemoryBroker,
        filter: F,
        outputs: Vec<PipeDescriptor>,
    ) -> FilterRunner<F> {
        FilterRunner::new(
            filter,
            Arc::new(PipeEndpoint::new(Arc::new(broker.clone()))),
            PipeDescriptor::queue(ADDR, "in"),
            OutputSet::new(outputs, Some(ADDR.to_string())),
        )
    }

    fn out() -> Vec<PipeDescriptor> {
        vec![PipeDescriptor::queue(ADDR, "out")]
    }

    fn send(broker: &InMemoryBroker, data: Value) -> MessageEnvelope {
        let message = MessageEnvelope::new("test", "test.event", data);
        broker.enqueue("in", message.to_vec().unwrap());
        message
    }

    fn received(broker: &InMemoryBroker, queue: &str) -> Vec<MessageEnvelope> {
        broker
            .drain_queue(queue)
            .iter()
            .map(|payload| MessageEnvelope::from_slice(payload).unwrap())
            .collect()
    }

    /// Resolves once the input queue is empty and every delivery is settled.
    async fn drained(broker: InMemoryBroker) {
        while broker.queue_depth("in") > 0 || broker.unacked_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn run_to_idle<F: MessageFilter>(
        runner: &mut FilterRunner<F>,
        broker: &InMemoryBroker,
    ) -> Result<RunSummary, RunnerError> {
        tokio::time::timeout(Duration::from_secs(5), runner.run_until(drained(broker.clone())))
            .await
            .expect("runner did not go idle")
    }

    fn temperature_router() -> ContentRouter {
        let table = RoutingTable::from_json(
            r#"{"criterias":[
                {"condition":"message.data.temperature > 30","destination":"hot"},
                {"condition":"message.data.temperature <= 30","destination":"cold"}
            ]}"#,
        )
        .unwrap();
        ContentRouter::content_based(table)
    }

    #[tokio::test]
    async fn test_router_publishes_to_listed_outputs() {
        let broker = InMemoryBroker::new();
        let mut runner = runner(
            &broker,
            temperature_router(),
            vec![
                PipeDescriptor::queue(ADDR, "hot"),
                PipeDescriptor::queue(ADDR, "cold"),
            ],
        );
        let hot = send(&broker, json!({"temperature": 35}));
        send(&broker, json!({"temperature": 10}));

        let summary = run_to_idle(&mut runner, &broker).await.unwrap();
        assert_eq!(summary.metrics.consumed, 2);
        assert_eq!(summary.metrics.published, 2);
        assert_eq!(summary.metrics.acknowledged, 2);

        let hot_received = received(&broker, "hot");
        assert_eq!(hot_received, vec![hot]);
        assert_eq!(received(&broker, "cold").len(), 1);
        assert_eq!(runner.state(), RunnerState::Stopped);
    }

    #[tokio::test]
    async fn test_unroutable_message_is_acked_and_dropped() {
        let broker = InMemoryBroker::new();
        let out = vec![PipeDescriptor::queue(ADDR, "hot")];
        let mut runner = runner(&broker, temperature_router(), out);
        send(&broker, json!({"humidity": 80}));

        let summary = run_to_idle(&mut runner, &broker).await.unwrap();
        assert_eq!(summary.metrics.dropped, 1);
        assert_eq!(summary.metrics.acknowledged, 1);
        assert_eq!(summary.metrics.published, 0);
        assert_eq!(broker.unacked_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_without_requeue() {
        let broker = InMemoryBroker::new();
        let mut runner = runner(&broker, WireTap, out());
        broker.enqueue("in", b"not json".to_vec());
        let good = send(&broker, json!({"n": 1}));

        let summary = run_to_idle(&mut runner, &broker).await.unwrap();
        assert_eq!(summary.metrics.rejected, 1);
        assert_eq!(summary.metrics.published, 1);
        assert_eq!(broker.dead_lettered_count(), 1);
        assert_eq!(received(&broker, "out"), vec![good]);
    }

    #[tokio::test]
    async fn test_fail_policy_stops_without_settling() {
        let broker = InMemoryBroker::new();
        let mut runner = runner(&broker, WireTap, out())
            .with_decode_policy(DecodePolicy::Fail);
        broker.enqueue("in", b"{".to_vec());

        let err = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RunnerError::Decode(_)));
        assert_eq!(runner.state(), RunnerState::Failed);
        assert_eq!(broker.unacked_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_delivery_unacked() {
        let broker = InMemoryBroker::new();
        broker.fail_publishes(true);
        let mut runner = runner(&broker, WireTap, out());
        send(&broker, json!({"n": 1}));

        let err = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RunnerError::Transport(_)));
        assert_eq!(broker.unacked_count(), 1);
        assert_eq!(runner.metrics().snapshot().acknowledged, 0);
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_runner() {
        let broker = InMemoryBroker::new();
        broker.set_unreachable(ADDR);
        let mut runner = runner(&broker, WireTap, Vec::new());
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::Transport(TransportError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_aggregator_flush_and_discarded_remainder() {
        let broker = InMemoryBroker::new();
        let filter = AggregatorFilter::aggregator(
            AggregatorConfig::from_json(r#"{"selector":["v"],"count":2}"#).unwrap(),
            EnvelopeIdentity::for_filter("aggregator"),
        )
        .unwrap();
        let mut runner = runner(&broker, filter, vec![PipeDescriptor::queue(ADDR, "out")]);
        for v in 1..=3 {
            send(&broker, json!({"v": v}));
        }

        let summary = run_to_idle(&mut runner, &broker).await.unwrap();
        assert_eq!(summary.metrics.consumed, 3);
        assert_eq!(summary.metrics.acknowledged, 3);
        assert_eq!(summary.metrics.flushes, 1);
        assert_eq!(summary.discarded, 1);

        let out = received(&broker, "out");
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].data,
            Some(json!({"aggregate": [{"v": 1}, {"v": 2}]}))
        );
    }

    #[tokio::test]
    async fn test_stream_end_stops_cleanly() {
        let broker = InMemoryBroker::new();
        let mut runner = runner(&broker, Receiver, Vec::new());
        let mut states = runner.watch_state();
        let closer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });

        let summary = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.metrics, RunnerSnapshot::default());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), RunnerState::Stopped);
    }

    #[test]
    fn test_decode_policy_parse() {
        assert_eq!("reject".parse::<DecodePolicy>().unwrap(), DecodePolicy::Reject);
        assert_eq!(" FAIL ".parse::<DecodePolicy>().unwrap(), DecodePolicy::Fail);
        assert!("retry".parse::<DecodePolicy>().is_err());
        assert_eq!(DecodePolicy::default(), DecodePolicy::Reject);
    }
}
