//! # Translator
//!
//! Builds a new `data` object from `{outputField: expression}` mappings
//! evaluated against the whole input envelope. An expression that resolves
//! to nothing leaves its output field out.
//!
//! Envelope attributes follow [`EnvelopePolicy`]: `preserve` keeps the input's
//! `id`, `source`, `type`, `time` and extensions; `regenerate` stamps a fresh
//! envelope with the filter's identity.

use std::collections::BTreeMap;

use eip_01_rule_engine::Condition;
use serde_json::{Map, Value};
use shared_types::{
    Disposition, EnvelopeIdentity, FilterError, MessageEnvelope, MessageFilter,
};
use tracing::debug;

use crate::config::{EnvelopePolicy, TranslatorConfig};

/// Translator filter.
#[derive(Debug, Clone)]
pub struct Translator {
    mappings: BTreeMap<String, Condition>,
    policy: EnvelopePolicy,
    identity: EnvelopeIdentity,
}

impl Translator {
    /// Translator over compiled mappings.
    #[must_use]
    pub fn new(config: TranslatorConfig, policy: EnvelopePolicy, identity: EnvelopeIdentity) -> Self {
        Self {
            mappings: config.mappings,
            policy,
            identity,
        }
    }

    /// Envelope policy.
    #[must_use]
    pub fn policy(&self) -> EnvelopePolicy {
        self.policy
    }

    /// Evaluate every mapping against `message`.
    #[must_use]
    pub fn translate_data(&self, message: &MessageEnvelope) -> Value {
        let mut data = Map::new();
        for (field, expression) in &self.mappings {
            match expression.evaluate_value(message) {
                Some(value) => {
                    data.insert(field.clone(), value.into_owned());
                }
                None => {
                    debug!(
                        filter = "translator",
                        id = %message.id,
                        field = %field,
                        expression = %expression,
                        "Expression produced no value"
                    );
                }
            }
        }
        Value::Object(data)
    }

    /// Translate one message.
    #[must_use]
    pub fn translate(&self, message: MessageEnvelope) -> MessageEnvelope {
        let data = self.translate_data(&message);
        match self.policy {
            EnvelopePolicy::Preserve => MessageEnvelope {
                data: Some(data),
                ..message
            },
            EnvelopePolicy::Regenerate => self.identity.stamp(data),
        }
    }
}

impl MessageFilter for Translator {
    fn name(&self) -> &str {
        "translator"
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        Ok(Disposition::forward(self.translate(message)))
    }
}
