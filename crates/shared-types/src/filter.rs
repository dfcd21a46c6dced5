//! # Message Filter Trait
//!
//! The contract every filter specialization implements so a single runner
//! can drive it: consume one envelope, then emit zero or more envelopes,
//! hold it in a buffer, or drop it.
//!
//! ## Example Implementation
//!
//! ```rust
//! use shared_types::{Disposition, FilterError, MessageEnvelope, MessageFilter};
//!
//! struct PassThrough;
//!
//! impl MessageFilter for PassThrough {
//!     fn name(&self) -> &str { "pass-through" }
//!
//!     fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
//!         Ok(Disposition::forward(message))
//!     }
//! }
//! ```
//!
//! Filters are synchronous and owned by exactly one runner, so they hold
//! their state (buffers, routing tables) directly without locks.

use std::fmt;

use crate::envelope::MessageEnvelope;
use crate::errors::FilterError;

/// Where an emitted envelope goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The runner's primary (first configured) output.
    Primary,
    /// A logical destination name, resolved by the runner.
    Named(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Primary => f.write_str("<primary>"),
            Destination::Named(name) => f.write_str(name),
        }
    }
}

/// One envelope to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Target.
    pub destination: Destination,
    /// Envelope to publish.
    pub message: MessageEnvelope,
}

impl Emission {
    /// Emit to the primary output.
    #[must_use]
    pub fn primary(message: MessageEnvelope) -> Self {
        Self {
            destination: Destination::Primary,
            message,
        }
    }

    /// Emit to a named destination.
    pub fn named(destination: impl Into<String>, message: MessageEnvelope) -> Self {
        Self {
            destination: Destination::Named(destination.into()),
            message,
        }
    }
}

/// Why a filter consumed a message without emitting or holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// A predicate gate rejected the message.
    Filtered,
    /// The message lacks fields the filter requires.
    Invalid,
}

impl DropReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Filtered => "filtered",
            DropReason::Invalid => "invalid",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a filter did with one message. In every case the input is
/// acknowledged once the emissions (if any) are published.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Publish these envelopes (possibly none).
    Emit(Vec<Emission>),
    /// Kept in the filter's buffer; nothing to publish yet.
    Held,
    /// Discarded on purpose.
    Dropped(DropReason),
}

impl Disposition {
    /// Forward one envelope to the primary output.
    #[must_use]
    pub fn forward(message: MessageEnvelope) -> Self {
        Disposition::Emit(vec![Emission::primary(message)])
    }

    /// Envelopes to publish (empty for `Held` and `Dropped`).
    #[must_use]
    pub fn into_emissions(self) -> Vec<Emission> {
        match self {
            Disposition::Emit(emissions) => emissions,
            Disposition::Held | Disposition::Dropped(_) => Vec::new(),
        }
    }
}

/// A message-processing filter.
pub trait MessageFilter: Send {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &str;

    /// Handle one decoded message.
    ///
    /// A non-fatal error ([`FilterError::Routing`]) drops the message; a fatal
    /// one stops the runner without acknowledging it.
    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError>;

    /// Messages currently held in memory (lost if the process stops now).
    fn buffered(&self) -> usize {
        0
    }

    /// Batches flushed since the filter was created.
    fn flushes(&self) -> u64 {
        0
    }
}

impl<F: MessageFilter + ?Sized> MessageFilter for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        (**self).process(message)
    }

    fn buffered(&self) -> usize {
        (**self).buffered()
    }

    fn flushes(&self) -> u64 {
        (**self).flushes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter {
        seen: usize,
    }

    impl MessageFilter for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
            self.seen += 1;
            if self.seen % 2 == 0 {
                return Ok(Disposition::Dropped(DropReason::Filtered));
            }
            Ok(Disposition::Emit(vec![Emission::named("out", message)]))
        }
    }

    #[test]
    fn test_boxed_filter_delegates() {
        let mut filter: Box<dyn MessageFilter> = Box::new(Counter { seen: 0 });
        let out = filter
            .process(MessageEnvelope::new("s", "t", json!({})))
            .unwrap()
            .into_emissions();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].destination, Destination::Named("out".into()));
        let second = filter
            .process(MessageEnvelope::new("s", "t", json!({})))
            .unwrap();
        assert_eq!(second, Disposition::Dropped(DropReason::Filtered));
        assert!(second.into_emissions().is_empty());
        assert_eq!(filter.name(), "counter");
        assert_eq!(filter.buffered(), 0);
        assert_eq!(filter.flushes(), 0);
    }

    #[test]
    fn test_forward_targets_primary() {
        let message = MessageEnvelope::new("s", "t", json!({"a": 1}));
        let Disposition::Emit(out) = Disposition::forward(message.clone()) else {
            panic!("expected emissions");
        };
        assert_eq!(out, vec![Emission::primary(message)]);
        assert_eq!(DropReason::Invalid.to_string(), "invalid");
    }

    #[test]
    fn test_destination_display() {
        assert_eq!(Destination::Primary.to_string(), "<primary>");
        assert_eq!(Destination::Named("q".into()).to_string(), "q");
    }
}
