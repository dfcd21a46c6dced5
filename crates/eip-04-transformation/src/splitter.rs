//! # Splitter
//!
//! One input, one output per configured field present in `data`. Each output
//! is a new envelope whose `data` holds only `{last_segment: value}`.

use serde_json::{Map, Value};
use shared_types::{
    Disposition, Emission, EnvelopeIdentity, FieldPath, FilterError, MessageEnvelope,
    MessageFilter,
};
use tracing::{debug, info};

use crate::config::SplitterConfig;

/// Splitter filter.
#[derive(Debug, Clone)]
pub struct Splitter {
    fields: Vec<FieldPath>,
    identity: EnvelopeIdentity,
}

impl Splitter {
    /// Splitter over `fields`, stamping outputs with `identity`.
    #[must_use]
    pub fn new(config: SplitterConfig, identity: EnvelopeIdentity) -> Self {
        Self {
            fields: config.fields,
            identity,
        }
    }

    /// Split one message; fields that are absent are skipped.
    #[must_use]
    pub fn split(&self, message: &MessageEnvelope) -> Vec<MessageEnvelope> {
        self.fields
            .iter()
            .filter_map(|path| {
                let Some(value) = message.resolve_in_data(path) else {
                    info!(filter = "splitter", id = %message.id, field = %path, "Field not found");
                    return None;
                };
                let mut data = Map::new();
                data.insert(path.last_segment().to_string(), value.clone());
                Some(self.identity.stamp(Value::Object(data)))
            })
            .collect()
    }
}

impl MessageFilter for Splitter {
    fn name(&self) -> &str {
        "splitter"
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        let parts = self.split(&message);
        debug!(filter = "splitter", id = %message.id, parts = parts.len(), "Message split");
        Ok(Disposition::Emit(
            parts.into_iter().map(Emission::primary).collect(),
        ))
    }
}
