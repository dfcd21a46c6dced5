//! # Content Filter
//!
//! Strips configured fields from `data` in place and forwards the envelope.
//! Absent paths are no-ops, so the filter is idempotent.

use shared_types::{Disposition, FieldPath, FilterError, MessageEnvelope, MessageFilter};
use tracing::debug;

use crate::config::ContentFilterConfig;

/// Content filter.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    fields: Vec<FieldPath>,
}

impl ContentFilter {
    /// Filter removing `fieldsToRemove`.
    #[must_use]
    pub fn new(config: ContentFilterConfig) -> Self {
        Self {
            fields: config.fields_to_remove,
        }
    }

    /// Remove the configured fields; returns how many were present.
    pub fn strip(&self, message: &mut MessageEnvelope) -> usize {
        let Some(data) = message.data.as_mut() else {
            return 0;
        };
        self.fields
            .iter()
            .filter(|path| path.remove(data).is_some())
            .count()
    }
}

impl MessageFilter for ContentFilter {
    fn name(&self) -> &str {
        "content-filter"
    }

    fn process(&mut self, mut message: MessageEnvelope) -> Result<Disposition, FilterError> {
        let removed = self.strip(&mut message);
        debug!(filter = "content-filter", id = %message.id, removed, "Message filtered");
        Ok(Disposition::forward(message))
    }
}
