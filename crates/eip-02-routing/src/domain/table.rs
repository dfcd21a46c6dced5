//! Routing table: ordered `(condition, destination)` rules plus a default.
//!
//! Configuration shape:
//!
//! ```json
//! {
//!   "criterias": [
//!     {"condition": "message.data.temperature > 30", "destination": "alerts"},
//!     {"condition": "message.data.temperature <= 30", "destination": "normal"}
//!   ],
//!   "default": "unsorted"
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use eip_01_rule_engine::Condition;
use serde::{Deserialize, Serialize};
use shared_types::{ConfigurationError, MessageEnvelope, RoutingError};

/// Evaluation mode, fixed per filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// First matching rule wins (content-based router).
    #[default]
    Single,
    /// Every matching rule (recipient list).
    Multiple,
}

impl RoutingMode {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingMode::Single => "single",
            RoutingMode::Multiple => "multiple",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(RoutingMode::Single),
            "multiple" => Ok(RoutingMode::Multiple),
            other => Err(ConfigurationError::invalid(
                "mode",
                format!("expected 'single' or 'multiple', got '{other}'"),
            )),
        }
    }
}

/// One routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Predicate over the candidate message.
    pub condition: Condition,
    /// Logical destination name.
    pub destination: String,
}

/// Raw configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rules in evaluation order.
    pub criterias: Vec<Rule>,
    /// Fallback destination; an empty string counts as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Validated, ordered routing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoutingConfig", into = "RoutingConfig")]
pub struct RoutingTable {
    rules: Vec<Rule>,
    default: Option<String>,
}

impl RoutingTable {
    /// Build a table.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidValue`] if any destination is empty.
    pub fn new(rules: Vec<Rule>, default: Option<String>) -> Result<Self, ConfigurationError> {
        if let Some(position) = rules.iter().position(|r| r.destination.trim().is_empty()) {
            return Err(ConfigurationError::invalid(
                format!("criterias[{position}].destination"),
                "destination is empty",
            ));
        }
        let default = default.filter(|d| !d.trim().is_empty());
        Ok(Self { rules, default })
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Document`] for malformed JSON, missing fields or
    /// conditions that fail to compile.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(document).map_err(|e| ConfigurationError::Document(e.to_string()))
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The fallback destination.
    #[must_use]
    pub fn default_destination(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Every destination the table can produce, in rule order then default,
    /// without duplicates.
    #[must_use]
    pub fn destinations(&self) -> Vec<&str> {
        let mut all: Vec<&str> = Vec::new();
        let candidates = self
            .rules
            .iter()
            .map(|r| r.destination.as_str())
            .chain(self.default.as_deref());
        for destination in candidates {
            if !all.contains(&destination) {
                all.push(destination);
            }
        }
        all
    }

    /// First rule (in declared order) whose condition holds, else the default.
    ///
    /// # Errors
    ///
    /// [`RoutingError::NoMatchingRule`] when nothing matches and there is no
    /// default.
    pub fn route_single(&self, message: &MessageEnvelope) -> Result<&str, RoutingError> {
        self.rules
            .iter()
            .find(|rule| rule.condition.evaluate(message))
            .map(|rule| rule.destination.as_str())
            .or(self.default.as_deref())
            .ok_or_else(|| RoutingError::NoMatchingRule {
                message_id: message.id.clone(),
            })
    }

    /// Every matching destination in rule order, duplicates suppressed.
    ///
    /// Falls back to the default as the sole element when nothing matches;
    /// empty when there is no default either.
    #[must_use]
    pub fn route_multiple(&self, message: &MessageEnvelope) -> Vec<&str> {
        let mut matched: Vec<&str> = Vec::new();
        for rule in &self.rules {
            let destination = rule.destination.as_str();
            if !matched.contains(&destination) && rule.condition.evaluate(message) {
                matched.push(destination);
            }
        }
        if matched.is_empty() {
            matched.extend(self.default.as_deref());
        }
        matched
    }

    /// Dispatch on `mode`; single mode yields at most one destination.
    ///
    /// # Errors
    ///
    /// [`RoutingError::NoMatchingRule`] when the result would be empty.
    pub fn route(
        &self,
        mode: RoutingMode,
        message: &MessageEnvelope,
    ) -> Result<Vec<&str>, RoutingError> {
        match mode {
            RoutingMode::Single => self.route_single(message).map(|d| vec![d]),
            RoutingMode::Multiple => {
                let destinations = self.route_multiple(message);
                if destinations.is_empty() {
                    Err(RoutingError::NoMatchingRule {
                        message_id: message.id.clone(),
                    })
                } else {
                    Ok(destinations)
                }
            }
        }
    }
}

impl TryFrom<RoutingConfig> for RoutingTable {
    type Error = ConfigurationError;

    fn try_from(config: RoutingConfig) -> Result<Self, Self::Error> {
        Self::new(config.criterias, config.default)
    }
}

impl From<RoutingTable> for RoutingConfig {
    fn from(table: RoutingTable) -> Self {
        Self {
            criterias: table.rules,
            default: table.default,
        }
    }
}
