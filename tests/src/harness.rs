//! Test pipeline: several filter processes sharing one [`InMemoryBroker`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use filter_runtime::{run_filter, RunOutcome, RunnerError, RuntimeConfig};
use serde_json::Value;
use shared_bus::InMemoryBroker;
use shared_types::MessageEnvelope;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Broker address every stage uses.
pub const BROKER: &str = "amqp://test-broker";

/// How long helpers wait before giving up.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// Running filters plus the broker they share.
pub struct Pipeline {
    broker: InMemoryBroker,
    shutdown: watch::Sender<bool>,
    stages: Vec<JoinHandle<Result<RunOutcome, RunnerError>>>,
}

impl Pipeline {
    /// Empty pipeline over a fresh broker.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            broker: InMemoryBroker::new(),
            shutdown,
            stages: Vec::new(),
        }
    }

    /// The shared broker.
    #[must_use]
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Parse `settings` as the environment of one filter process.
    ///
    /// # Errors
    ///
    /// The configuration error `RuntimeConfig` reports.
    pub fn config(settings: &[(&str, &str)]) -> Result<RuntimeConfig, shared_types::ConfigurationError> {
        let map: HashMap<&str, &str> = settings.iter().copied().collect();
        RuntimeConfig::from_lookup(|key| map.get(key).map(|v| (*v).to_string()))
    }

    /// Start one filter process.
    ///
    /// # Panics
    ///
    /// If `settings` is not a valid configuration.
    pub fn spawn(&mut self, settings: &[(&str, &str)]) {
        let config = match Self::config(settings) {
            Ok(config) => config,
            Err(e) => panic!("invalid stage configuration: {e}"),
        };
        let connector = Arc::new(self.broker.clone());
        let mut stop = self.shutdown.subscribe();
        let shutdown = async move {
            // A dropped sender also means stop.
            let _ = stop.wait_for(|stop| *stop).await;
        };
        self.stages
            .push(tokio::spawn(run_filter(config, connector, shutdown)));
    }

    /// Place a new envelope carrying `data` on `queue`.
    pub fn send(&self, queue: &str, data: Value) -> MessageEnvelope {
        let message = MessageEnvelope::new("test-client", "test.event", data);
        self.send_envelope(queue, &message);
        message
    }

    /// Place an existing envelope on `queue`.
    pub fn send_envelope(&self, queue: &str, message: &MessageEnvelope) {
        match message.to_vec() {
            Ok(payload) => self.broker.enqueue(queue, payload),
            Err(e) => panic!("cannot encode test envelope: {e}"),
        }
    }

    /// Wait until `queue` holds at least `count` messages, then take them all.
    ///
    /// # Panics
    ///
    /// On timeout or if a payload is not an envelope.
    pub async fn collect(&self, queue: &str, count: usize) -> Vec<MessageEnvelope> {
        let broker = self.broker.clone();
        let waited = tokio::time::timeout(PATIENCE, async move {
            while broker.queue_depth(queue) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if waited.is_err() {
            panic!(
                "timed out waiting for {count} messages on '{queue}' (have {})",
                self.broker.queue_depth(queue)
            );
        }
        self.broker
            .drain_queue(queue)
            .iter()
            .map(|payload| match MessageEnvelope::from_slice(payload) {
                Ok(message) => message,
                Err(e) => panic!("'{queue}' carried a non-envelope payload: {e}"),
            })
            .collect()
    }

    /// Wait until `exchange` has at least `count` bound queues.
    ///
    /// # Panics
    ///
    /// On timeout.
    pub async fn await_bindings(&self, exchange: &str, count: usize) {
        let broker = self.broker.clone();
        let waited = tokio::time::timeout(PATIENCE, async move {
            while broker.binding_count(exchange) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if waited.is_err() {
            panic!("timed out waiting for {count} bindings on '{exchange}'");
        }
    }

    /// Wait until nothing is ready on `queues` and every delivery is settled.
    ///
    /// # Panics
    ///
    /// On timeout.
    pub async fn settle(&self, queues: &[&str]) {
        let broker = self.broker.clone();
        let waited = tokio::time::timeout(PATIENCE, async move {
            while queues.iter().any(|q| broker.queue_depth(q) > 0) || broker.unacked_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if waited.is_err() {
            panic!("pipeline did not settle");
        }
    }

    /// Wait for every stage to end on its own (failure or closed input).
    ///
    /// # Panics
    ///
    /// If a stage task panicked or is still running after the timeout.
    pub async fn finished(self) -> Vec<Result<RunOutcome, RunnerError>> {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for stage in self.stages {
            match tokio::time::timeout(PATIENCE, stage).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => panic!("stage task panicked: {e}"),
                Err(_) => panic!("stage is still running"),
            }
        }
        outcomes
    }

    /// Signal every stage to stop and collect how each one ended.
    ///
    /// # Panics
    ///
    /// If a stage task panicked or does not stop in time.
    pub async fn stop(self) -> Vec<Result<RunOutcome, RunnerError>> {
        self.shutdown.send_replace(true);
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for stage in self.stages {
            match tokio::time::timeout(PATIENCE, stage).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => panic!("stage task panicked: {e}"),
                Err(_) => panic!("stage did not stop"),
            }
        }
        outcomes
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
