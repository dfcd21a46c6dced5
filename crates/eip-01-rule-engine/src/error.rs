//! Error types for the rule engine.
//!
//! Evaluation never fails (missing data makes a predicate false), so every
//! error here is a compile-time error about the expression text.

use shared_types::ConfigurationError;
use thiserror::Error;

/// Errors raised while compiling an expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("Expression is empty")]
    Empty,

    #[error("Expression too long: {len} > {max} bytes")]
    TooLong { len: usize, max: usize },

    #[error("Expression nested too deeply (max depth {max})")]
    TooDeep { max: usize },

    #[error("Unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("Invalid number '{text}' at offset {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("Unexpected {found} at offset {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        pos: usize,
    },

    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
}

impl RuleError {
    /// Wrap as a configuration error for the expression `source`.
    pub fn into_configuration(self, source: &str) -> ConfigurationError {
        ConfigurationError::InvalidCondition {
            condition: source.to_string(),
            reason: self.to_string(),
        }
    }
}
