//! # Rule Engine
//!
//! Compiles condition strings into [`Condition`]s and evaluates them
//! against envelopes.
//!
//! ## Example
//!
//! ```rust
//! use eip_01_rule_engine::Condition;
//! use shared_types::MessageEnvelope;
//! use serde_json::json;
//!
//! let hot = Condition::compile("message.data.temperature > 30").unwrap();
//! let reading = MessageEnvelope::new("sensor", "reading", json!({"temperature": 35}));
//! assert!(hot.evaluate(&reading));
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use shared_types::{FieldPath, MessageEnvelope};

use crate::domain::ast::Expr;
use crate::domain::{eval, parser};
use crate::error::RuleError;

/// Longest accepted expression source, in bytes.
pub const MAX_EXPRESSION_BYTES: usize = 4096;

/// Deepest accepted nesting of parentheses, arrays, calls and prefix operators.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Compile-time sandbox limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum source length in bytes.
    pub max_bytes: usize,
    /// Maximum nesting depth.
    pub max_depth: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_EXPRESSION_BYTES,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// Entry point for compiling and evaluating conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine {
    limits: EngineLimits,
}

impl RuleEngine {
    /// Engine with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom limits.
    #[must_use]
    pub fn with_limits(limits: EngineLimits) -> Self {
        Self { limits }
    }

    /// Active limits.
    #[must_use]
    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Compile a condition.
    ///
    /// # Errors
    ///
    /// [`RuleError`] if the source exceeds the limits or does not parse.
    pub fn compile(&self, source: &str) -> Result<Condition, RuleError> {
        if source.len() > self.limits.max_bytes {
            return Err(RuleError::TooLong {
                len: source.len(),
                max: self.limits.max_bytes,
            });
        }
        let expr = parser::parse(source, self.limits.max_depth)?;
        Ok(Condition {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// Evaluate a compiled condition as a predicate (fails closed).
    #[must_use]
    pub fn evaluate_predicate(&self, condition: &Condition, message: &MessageEnvelope) -> bool {
        condition.evaluate(message)
    }

    /// Resolve a dotted path from the envelope root; `None` when absent.
    #[must_use]
    pub fn evaluate_field_path<'m>(
        &self,
        message: &'m MessageEnvelope,
        path: &FieldPath,
    ) -> Option<Cow<'m, Value>> {
        message.resolve(path)
    }
}

/// A compiled, sandboxed expression.
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Compile with the default limits.
    ///
    /// # Errors
    ///
    /// See [`RuleEngine::compile`].
    pub fn compile(source: &str) -> Result<Self, RuleError> {
        RuleEngine::new().compile(source)
    }

    /// The expression text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate as a predicate. Missing data makes the result `false`.
    #[must_use]
    pub fn evaluate(&self, message: &MessageEnvelope) -> bool {
        eval::evaluate_predicate(&self.expr, message)
    }

    /// Evaluate to a value; `None` when the result is missing.
    #[must_use]
    pub fn evaluate_value<'a>(&'a self, message: &'a MessageEnvelope) -> Option<Cow<'a, Value>> {
        eval::evaluate(&self.expr, message)
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::compile(&source).map_err(|e| {
            serde::de::Error::custom(format!("invalid condition '{source}': {e}"))
        })
    }
}
