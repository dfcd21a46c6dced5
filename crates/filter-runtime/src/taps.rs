//! General-purpose filters with no configuration document.

use shared_types::{Disposition, FilterError, MessageEnvelope, MessageFilter};
use tracing::info;

/// Wire tap: logs every message and forwards it unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireTap;

impl MessageFilter for WireTap {
    fn name(&self) -> &str {
        "logger"
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        info!(
            filter = "logger",
            id = %message.id,
            source = %message.source,
            event_type = %message.event_type,
            data = ?message.data,
            "Message observed"
        );
        Ok(Disposition::forward(message))
    }
}

/// Sink: logs every message; the runner then acknowledges it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Receiver;

impl MessageFilter for Receiver {
    fn name(&self) -> &str {
        "receiver"
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        info!(
            filter = "receiver",
            id = %message.id,
            source = %message.source,
            event_type = %message.event_type,
            data = ?message.data,
            "Message received"
        );
        Ok(Disposition::Emit(Vec::new()))
    }
}
