//! Message filter: forward only messages that satisfy every rule.

use shared_types::{Disposition, DropReason, FilterError, MessageEnvelope, MessageFilter};
use tracing::{debug, info};

use crate::domain::GateRules;

/// Predicate gate in front of the primary output.
#[derive(Debug, Clone)]
pub struct PredicateFilter {
    rules: GateRules,
}

impl PredicateFilter {
    /// Create a gate.
    #[must_use]
    pub fn new(rules: GateRules) -> Self {
        Self { rules }
    }
}

impl MessageFilter for PredicateFilter {
    fn name(&self) -> &str {
        "message-filter"
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        if self.rules.admits(&message) {
            debug!(filter = "message-filter", id = %message.id, "Message admitted");
            Ok(Disposition::forward(message))
        } else {
            info!(filter = "message-filter", id = %message.id, "Message filtered out");
            Ok(Disposition::Dropped(DropReason::Filtered))
        }
    }
}
