//! # Buffering Filter
//!
//! Drives a [`BatchStrategy`] over an owned [`BufferState`]: admitted messages
//! are held, the batch is flushed when the threshold is reached, rejected
//! messages are dropped without progress toward the threshold.
//!
//! Buffered messages live only in this value. If the process stops before a
//! flush they are lost; [`MessageFilter::buffered`] reports how many.

use shared_types::{
    ConfigurationError, Disposition, DropReason, EnvelopeIdentity, FilterError, MessageEnvelope,
    MessageFilter,
};
use tracing::info;

use crate::config::{AggregatorConfig, ResequencerConfig};
use crate::domain::{Aggregator, BatchStrategy, BufferState, Resequencer};

/// A count-triggered buffering filter.
#[derive(Debug)]
pub struct BufferingFilter<S> {
    strategy: S,
    state: BufferState,
    flushes: u64,
}

/// Aggregator filter.
pub type AggregatorFilter = BufferingFilter<Aggregator>;

/// Resequencer filter.
pub type ResequencerFilter = BufferingFilter<Resequencer>;

impl<S: BatchStrategy> BufferingFilter<S> {
    /// Filter over a strategy and an empty buffer.
    #[must_use]
    pub fn new(strategy: S, state: BufferState) -> Self {
        Self {
            strategy,
            state,
            flushes: 0,
        }
    }

    /// The strategy.
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// The buffer.
    #[must_use]
    pub fn state(&self) -> &BufferState {
        &self.state
    }
}

impl BufferingFilter<Aggregator> {
    /// Aggregator from its document.
    pub fn aggregator(
        config: AggregatorConfig,
        identity: EnvelopeIdentity,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let state = BufferState::with_count(config.count)?;
        Ok(Self::new(Aggregator::new(config.selector, identity), state))
    }
}

impl BufferingFilter<Resequencer> {
    /// Resequencer from its document.
    pub fn resequencer(config: ResequencerConfig) -> Result<Self, ConfigurationError> {
        let state = BufferState::with_count(config.count)?;
        Ok(Self::new(Resequencer::new(config.field), state))
    }
}

impl<S: BatchStrategy> MessageFilter for BufferingFilter<S> {
    fn name(&self) -> &str {
        self.strategy.kind()
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        let kind = self.strategy.kind();
        if !self.strategy.admit(&message) {
            info!(filter = kind, id = %message.id, "Message skipped: missing selector fields");
            return Ok(Disposition::Dropped(DropReason::Invalid));
        }

        let id = message.id.clone();
        match self.state.push(message) {
            None => {
                info!(
                    filter = kind,
                    id = %id,
                    buffered = self.state.len(),
                    threshold = self.state.threshold().get(),
                    "Message buffered"
                );
                Ok(Disposition::Held)
            }
            Some(batch) => {
                let size = batch.len();
                let emissions = self.strategy.flush(batch);
                self.flushes += 1;
                info!(
                    filter = kind,
                    batch = size,
                    outputs = emissions.len(),
                    "Buffer flushed"
                );
                Ok(Disposition::Emit(emissions))
            }
        }
    }

    fn buffered(&self) -> usize {
        self.state.len()
    }

    fn flushes(&self) -> u64 {
        self.flushes
    }
}
