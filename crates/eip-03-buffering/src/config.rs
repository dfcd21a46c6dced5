//! Configuration documents for the buffering filters.
//!
//! ```json
//! {"selector": ["temperature", "unit"], "count": 3}
//! {"field": "data.sequence", "count": 5}
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{ConfigurationError, FieldPath};

/// Aggregator document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Fields (relative to `data`) every message must carry and that are copied
    /// into the aggregate.
    pub selector: Vec<FieldPath>,
    /// Batch size.
    pub count: usize,
}

impl AggregatorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(document)
            .map_err(|e| ConfigurationError::Document(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.selector.is_empty() {
            return Err(ConfigurationError::invalid(
                "selector",
                "must name at least one field",
            ));
        }
        validate_count(self.count)
    }
}

/// Resequencer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResequencerConfig {
    /// Sort field, from the envelope root.
    pub field: FieldPath,
    /// Batch size.
    pub count: usize,
}

impl ResequencerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(document)
            .map_err(|e| ConfigurationError::Document(e.to_string()))?;
        validate_count(config.count)?;
        Ok(config)
    }
}

fn validate_count(count: usize) -> Result<(), ConfigurationError> {
    if count == 0 {
        return Err(ConfigurationError::invalid("count", "must be at least 1"));
    }
    Ok(())
}
