//! # Error Types
//!
//! The error taxonomy shared by every filter.
//!
//! | Class | Raised when | Runner reaction |
//! |-------|-------------|-----------------|
//! | [`DecodeError`] | payload is not envelope JSON | per `DecodePolicy` (reject or fail) |
//! | [`ConfigurationError`] | descriptor/config document is invalid | filter never starts |
//! | [`RoutingError`] | no rule matched and no default | message dropped, still acknowledged |
//! | [`FilterError::Processing`] | filter cannot produce its output | runner fails, input not acknowledged |
//!
//! Transport failures live in `shared-bus` and are always fatal.

use thiserror::Error;

/// A delivery payload could not be decoded into an envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload was empty.
    #[error("Empty payload")]
    Empty,

    /// The payload is not a JSON envelope.
    #[error("Invalid envelope JSON: {0}")]
    InvalidJson(String),
}

/// Invalid filter or pipe configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Pipe kind other than `queue` / `topic`.
    #[error("Unknown pipe kind: {0}")]
    UnknownPipeKind(String),

    /// A descriptor string did not match `address,name[,kind]`.
    #[error("Malformed pipe descriptor {descriptor:?}: {reason}")]
    MalformedDescriptor { descriptor: String, reason: String },

    /// A field path is empty or has empty segments.
    #[error("Invalid field path {path:?}: {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// A required setting is absent.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A setting is present but unusable.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A configuration document could not be read or parsed.
    #[error("Invalid configuration document: {0}")]
    Document(String),

    /// A rule condition failed to compile.
    #[error("Invalid condition {condition:?}: {reason}")]
    InvalidCondition { condition: String, reason: String },
}

impl ConfigurationError {
    /// Shorthand for [`ConfigurationError::InvalidValue`].
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A message could not be routed anywhere.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// No rule matched and the table has no default destination.
    #[error("No rule matched message {message_id} and no default destination is configured")]
    NoMatchingRule { message_id: String },
}

/// Errors returned by a filter's message handler.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The message cannot be routed; drop it.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The filter cannot continue in a consistent state.
    #[error("Processing failed: {0}")]
    Processing(String),
}

impl FilterError {
    /// Whether the runner must stop (as opposed to dropping the message).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, FilterError::Processing(_))
    }
}
