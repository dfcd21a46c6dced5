//! Configuration documents for the transformation filters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use eip_01_rule_engine::Condition;
use serde::{Deserialize, Serialize};
use shared_types::{ConfigurationError, FieldPath};

/// `{"fields": [path, ...]}`, paths relative to `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitterConfig {
    /// Fields to split out.
    pub fields: Vec<FieldPath>,
}

/// `{"fieldsToRemove": [path, ...]}`, paths relative to `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentFilterConfig {
    /// Fields to strip.
    pub fields_to_remove: Vec<FieldPath>,
}

/// `{outputField: expression, ...}`; expressions see the whole envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslatorConfig {
    /// Output field name to extraction expression.
    pub mappings: BTreeMap<String, Condition>,
}

impl SplitterConfig {
    /// Parse a JSON document.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        let config: Self = parse(document)?;
        if config.fields.is_empty() {
            return Err(ConfigurationError::invalid(
                "fields",
                "must name at least one field",
            ));
        }
        Ok(config)
    }
}

impl ContentFilterConfig {
    /// Parse a JSON document.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        parse(document)
    }
}

impl TranslatorConfig {
    /// Parse a JSON document. Every expression is compiled here.
    pub fn from_json(document: &str) -> Result<Self, ConfigurationError> {
        parse(document)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(document: &str) -> Result<T, ConfigurationError> {
    serde_json::from_str(document).map_err(|e| ConfigurationError::Document(e.to_string()))
}

/// What the translator does with the input envelope's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopePolicy {
    /// Keep `id`, `source`, `type`, `time` and extensions; replace `data`.
    #[default]
    Preserve,
    /// Build a new envelope (new `id` and `time`, the filter's identity).
    Regenerate,
}

impl EnvelopePolicy {
    /// Configuration spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopePolicy::Preserve => "preserve",
            EnvelopePolicy::Regenerate => "regenerate",
        }
    }
}

impl fmt::Display for EnvelopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopePolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(EnvelopePolicy::Preserve),
            "regenerate" => Ok(EnvelopePolicy::Regenerate),
            other => Err(ConfigurationError::invalid(
                "envelope policy",
                format!("expected 'preserve' or 'regenerate', got '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_filter_document_uses_camel_case() {
        let config = ContentFilterConfig::from_json(r#"{"fieldsToRemove":["b.c","d"]}"#).unwrap();
        assert_eq!(config.fields_to_remove.len(), 2);
        assert!(ContentFilterConfig::from_json(r#"{"fields_to_remove":["b"]}"#).is_err());
    }

    #[test]
    fn test_translator_document_compiles_expressions() {
        let config = TranslatorConfig::from_json(r#"{"x":"data.a","y":"data.b * 2"}"#).unwrap();
        assert_eq!(config.mappings.len(), 2);
        assert_eq!(config.mappings["x"].source(), "data.a");

        let err = TranslatorConfig::from_json(r#"{"x":"data.a =="}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Document(_)));
    }

    #[test]
    fn test_splitter_requires_fields() {
        assert!(SplitterConfig::from_json(r#"{"fields":["a"]}"#).is_ok());
        assert!(matches!(
            SplitterConfig::from_json(r#"{"fields":[]}"#),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_envelope_policy_parse() {
        assert_eq!("Regenerate".parse::<EnvelopePolicy>().unwrap(), EnvelopePolicy::Regenerate);
        assert_eq!(EnvelopePolicy::default(), EnvelopePolicy::Preserve);
        assert!("keep".parse::<EnvelopePolicy>().is_err());
    }
}
