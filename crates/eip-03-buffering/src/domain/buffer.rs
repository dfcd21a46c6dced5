//! # Buffer State
//!
//! The ordered accumulation owned by one buffering filter. A push that brings
//! the length to the threshold hands the whole batch back and leaves the
//! buffer empty; nothing carries over into the next cycle.

use std::num::NonZeroUsize;

use shared_types::{ConfigurationError, MessageEnvelope};

/// Messages held until `threshold` is reached.
#[derive(Debug, Clone)]
pub struct BufferState {
    messages: Vec<MessageEnvelope>,
    threshold: NonZeroUsize,
}

impl BufferState {
    /// Empty buffer flushing at `threshold`.
    #[must_use]
    pub fn new(threshold: NonZeroUsize) -> Self {
        Self {
            messages: Vec::with_capacity(threshold.get()),
            threshold,
        }
    }

    /// Empty buffer from a configured `count`, which must be at least 1.
    pub fn with_count(count: usize) -> Result<Self, ConfigurationError> {
        NonZeroUsize::new(count)
            .map(Self::new)
            .ok_or_else(|| ConfigurationError::invalid("count", "must be at least 1"))
    }

    /// Append a message. Returns the full batch, in arrival order, when the
    /// buffer reaches its threshold.
    pub fn push(&mut self, message: MessageEnvelope) -> Option<Vec<MessageEnvelope>> {
        self.messages.push(message);
        if self.messages.len() >= self.threshold.get() {
            Some(std::mem::replace(
                &mut self.messages,
                Vec::with_capacity(self.threshold.get()),
            ))
        } else {
            None
        }
    }

    /// Flush threshold.
    #[must_use]
    pub fn threshold(&self) -> NonZeroUsize {
        self.threshold
    }

    /// Messages currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The held messages in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[MessageEnvelope] {
        &self.messages
    }
}
