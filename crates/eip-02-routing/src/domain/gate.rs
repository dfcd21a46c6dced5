//! Message-filter rules: a message passes only if every rule holds.
//!
//! ```json
//! {"rules": [{"condition": "message.data.valid == true"}, {"condition": "exists(data.id)"}]}
//! ```

use eip_01_rule_engine::Condition;
use serde::{Deserialize, Serialize};
use shared_types::{ConfigurationError, MessageEnvelope};

/// One gate rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRule {
    /// Predicate that must hold.
    pub condition: Condition,
}

/// Conjunction of rules. An empty rule list passes everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRules {
    /// Rules, all of which must hold.
    pub rules: Vec<GateRule>,
}

impl GateRules {
    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Document`] for malformed JSON, a missing `rules`
    /// field or a condition that fails to compile.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(document).map_err(|e| ConfigurationError::Document(e.to_string()))
    }

    /// Whether every rule holds for `message`.
    #[must_use]
    pub fn admits(&self, message: &MessageEnvelope) -> bool {
        self.rules.iter().all(|rule| rule.condition.evaluate(message))
    }
}
