//! Per-runner counters.
//!
//! Lock-free and owned by one runner, so embedders and tests can read exact
//! counts without going through the global Prometheus registry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one runner.
#[derive(Debug, Default)]
pub struct RunnerMetrics {
    consumed: AtomicU64,
    published: AtomicU64,
    acknowledged: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    flushes: AtomicU64,
}

/// Point-in-time copy of [`RunnerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerSnapshot {
    /// Deliveries taken from the input pipe.
    pub consumed: u64,
    /// Envelopes published.
    pub published: u64,
    /// Deliveries acknowledged.
    pub acknowledged: u64,
    /// Messages acknowledged without output (filtered, invalid, unroutable).
    pub dropped: u64,
    /// Payloads rejected as malformed.
    pub rejected: u64,
    /// Buffer flushes.
    pub flushes: u64,
}

impl RunnerMetrics {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushes(&self, count: u64) {
        self.flushes.fetch_add(count, Ordering::Relaxed);
    }

    /// Current values.
    #[must_use]
    pub fn snapshot(&self) -> RunnerSnapshot {
        RunnerSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}
