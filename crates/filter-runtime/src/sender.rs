//! Periodic source: publishes a fresh envelope carrying a fixed payload.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use filter_telemetry::FilterMetrics;
use serde_json::Value;
use shared_bus::PipeEndpoint;
use shared_types::{EnvelopeIdentity, FilterError, MessageEnvelope, PipeDescriptor};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::runner::RunnerError;

/// Publishes `data` to one output every `interval`.
pub struct Sender {
    endpoint: Arc<PipeEndpoint>,
    output: PipeDescriptor,
    identity: EnvelopeIdentity,
    data: Value,
    interval: Duration,
    limit: Option<u64>,
    telemetry: FilterMetrics,
}

impl Sender {
    /// Unbounded sender.
    pub fn new(
        endpoint: Arc<PipeEndpoint>,
        output: PipeDescriptor,
        identity: EnvelopeIdentity,
        data: Value,
        interval: Duration,
    ) -> Self {
        Self {
            endpoint,
            output,
            identity,
            data,
            interval,
            limit: None,
            telemetry: FilterMetrics::for_filter("sender"),
        }
    }

    /// Stop after `count` messages.
    #[must_use]
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Publish one envelope with a new id and time.
    pub async fn send_once(&self) -> Result<MessageEnvelope, RunnerError> {
        let message = self.identity.stamp(self.data.clone());
        let body = message.to_vec().map_err(|e| {
            FilterError::Processing(format!("cannot encode envelope {}: {e}", message.id))
        })?;
        self.endpoint.publish(&self.output, &body).await?;
        self.telemetry.published(1);
        debug!(filter = "sender", id = %message.id, pipe = %self.output, "Message sent");
        Ok(message)
    }

    /// Send on every tick until `shutdown` resolves or the limit is reached.
    /// Returns the number of messages sent.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<u64, RunnerError>
    where
        S: Future<Output = ()>,
    {
        info!(
            filter = "sender",
            pipe = %self.output,
            interval_ms = self.interval.as_millis() as u64,
            "Sender started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut sent = 0;
        while self.limit.map_or(true, |limit| sent < limit) {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.send_once().await?;
                    sent += 1;
                }
            }
        }
        info!(filter = "sender", sent, "Sender stopped");
        Ok(sent)
    }
}
