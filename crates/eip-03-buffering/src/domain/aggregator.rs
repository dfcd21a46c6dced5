//! # Aggregator
//!
//! Combines `count` valid messages into one envelope whose `data.aggregate`
//! holds, per message in arrival order, an object keyed by the configured
//! selector strings.
//!
//! Selector paths resolve inside `data`. A message is valid iff every selector
//! resolves to a present value (an explicit `null` is present).

use serde_json::{Map, Value};
use shared_types::{Emission, EnvelopeIdentity, FieldPath, MessageEnvelope};

use super::strategy::BatchStrategy;

/// Key of the aggregated array inside the output `data`.
pub const AGGREGATE_FIELD: &str = "aggregate";

/// Group-and-merge strategy.
#[derive(Debug, Clone)]
pub struct Aggregator {
    selector: Vec<FieldPath>,
    identity: EnvelopeIdentity,
}

impl Aggregator {
    /// Aggregator extracting `selector`, stamping output with `identity`.
    #[must_use]
    pub fn new(selector: Vec<FieldPath>, identity: EnvelopeIdentity) -> Self {
        Self { selector, identity }
    }

    /// Configured selector.
    #[must_use]
    pub fn selector(&self) -> &[FieldPath] {
        &self.selector
    }

    fn extract(&self, message: &MessageEnvelope) -> Value {
        let item: Map<String, Value> = self
            .selector
            .iter()
            .filter_map(|path| {
                message
                    .resolve_in_data(path)
                    .map(|value| (path.as_str().to_string(), value.clone()))
            })
            .collect();
        Value::Object(item)
    }
}

impl BatchStrategy for Aggregator {
    fn kind(&self) -> &'static str {
        "aggregator"
    }

    fn admit(&self, message: &MessageEnvelope) -> bool {
        self.selector
            .iter()
            .all(|path| message.resolve_in_data(path).is_some())
    }

    fn flush(&self, batch: Vec<MessageEnvelope>) -> Vec<Emission> {
        let items: Vec<Value> = batch.iter().map(|message| self.extract(message)).collect();
        let mut data = Map::new();
        data.insert(AGGREGATE_FIELD.to_string(), Value::Array(items));
        let output = self.identity.stamp(Value::Object(data));
        vec![Emission::primary(output)]
    }
}
