//! Prometheus metrics for EIP filters.
//!
//! All metrics follow the naming convention `eip_<metric>_<unit>` and carry a
//! `filter` label.
//!
//! ## Metric Types
//!
//! - **Counter**: consumed, published, dropped, rejected, flushes
//! - **Gauge**: messages currently buffered (lost if the process stops)
//! - **Histogram**: per-message processing duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramTimer, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry for filter metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Deliveries taken from the input pipe
    pub static ref MESSAGES_CONSUMED: IntCounterVec = IntCounterVec::new(
        Opts::new("eip_messages_consumed_total", "Messages consumed from the input pipe"),
        &["filter"]
    ).expect("metric creation failed");

    /// Envelopes published to output pipes
    pub static ref MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("eip_messages_published_total", "Messages published to output pipes"),
        &["filter"]
    ).expect("metric creation failed");

    /// Messages consumed without output
    pub static ref MESSAGES_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("eip_messages_dropped_total", "Messages acknowledged without output"),
        &["filter", "reason"]  // reason: filtered/invalid/unroutable
    ).expect("metric creation failed");

    /// Payloads that did not decode as envelopes
    pub static ref MESSAGES_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("eip_messages_rejected_total", "Payloads rejected as malformed"),
        &["filter"]
    ).expect("metric creation failed");

    /// Buffer flushes
    pub static ref BUFFER_FLUSHES: IntCounterVec = IntCounterVec::new(
        Opts::new("eip_buffer_flushes_total", "Buffering filter flushes"),
        &["filter"]
    ).expect("metric creation failed");

    /// Messages held in memory
    pub static ref BUFFERED_MESSAGES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("eip_buffered_messages", "Messages held in a filter buffer"),
        &["filter"]
    ).expect("metric creation failed");

    /// Time from decode to acknowledgment
    pub static ref PROCESSING_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "eip_message_processing_duration_seconds",
            "Time spent handling one message"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).expect("bucket creation failed")),
        &["filter"]
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Calling it again is a no-op.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_CONSUMED.clone()),
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(MESSAGES_DROPPED.clone()),
        Box::new(MESSAGES_REJECTED.clone()),
        Box::new(BUFFER_FLUSHES.clone()),
        Box::new(BUFFERED_MESSAGES.clone()),
        Box::new(PROCESSING_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Metric children resolved for one filter label.
#[derive(Clone)]
pub struct FilterMetrics {
    filter: String,
    consumed: IntCounter,
    published: IntCounter,
    rejected: IntCounter,
    flushes: IntCounter,
    buffered: IntGauge,
}

impl FilterMetrics {
    /// Handles for `filter`.
    #[must_use]
    pub fn for_filter(filter: &str) -> Self {
        let labels = [filter];
        Self {
            filter: filter.to_string(),
            consumed: MESSAGES_CONSUMED.with_label_values(&labels),
            published: MESSAGES_PUBLISHED.with_label_values(&labels),
            rejected: MESSAGES_REJECTED.with_label_values(&labels),
            flushes: BUFFER_FLUSHES.with_label_values(&labels),
            buffered: BUFFERED_MESSAGES.with_label_values(&labels),
        }
    }

    /// One delivery consumed.
    pub fn consumed(&self) {
        self.consumed.inc();
    }

    /// `count` envelopes published.
    pub fn published(&self, count: usize) {
        self.published.inc_by(count as u64);
    }

    /// One message dropped for `reason`.
    pub fn dropped(&self, reason: &str) {
        MESSAGES_DROPPED
            .with_label_values(&[self.filter.as_str(), reason])
            .inc();
    }

    /// One payload rejected.
    pub fn rejected(&self) {
        self.rejected.inc();
    }

    /// `count` buffer flushes.
    pub fn flushed(&self, count: u64) {
        self.flushes.inc_by(count);
    }

    /// Current buffer occupancy.
    pub fn set_buffered(&self, count: usize) {
        self.buffered.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Start timing one message; observed when the timer drops.
    #[must_use]
    pub fn start_timer(&self) -> HistogramTimer {
        PROCESSING_DURATION
            .with_label_values(&[self.filter.as_str()])
            .start_timer()
    }
}

impl std::fmt::Debug for FilterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterMetrics")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
