//! Batch strategy: what a buffering filter keeps and what it emits on flush.

use shared_types::{Emission, MessageEnvelope};

/// The specialization point of [`crate::BufferingFilter`].
pub trait BatchStrategy: Send {
    /// Filter kind, used as the log and metric name.
    fn kind(&self) -> &'static str;

    /// Whether `message` may enter the buffer. Rejected messages are dropped
    /// and do not count toward the threshold.
    fn admit(&self, message: &MessageEnvelope) -> bool;

    /// Turn a full batch (arrival order) into the messages to publish.
    fn flush(&self, batch: Vec<MessageEnvelope>) -> Vec<Emission>;
}
