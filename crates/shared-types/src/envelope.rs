//! # `MessageEnvelope`
//!
//! The CloudEvents-shaped wrapper that every filter reads and writes.
//!
//! ## Wire Shape
//!
//! ```text
//! {"specversion":"1.0","id":"...","source":"...","type":"...","time":"<RFC 3339>","data":{...}}
//! ```
//!
//! ## Ownership Rules
//!
//! - Envelopes are never mutated after the filter that emits them has built them.
//! - Translated, aggregated and split output is always a NEW envelope
//!   (see [`EnvelopeIdentity::stamp`] and [`MessageEnvelope::with_data`]).
//! - Only the content filter mutates `data` in place, and routers forward the
//!   input envelope unchanged.

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::DecodeError;
use crate::field_path::FieldPath;

/// The CloudEvents specification version written on every envelope.
pub const SPEC_VERSION: &str = "1.0";

/// Root attribute names that field references may address directly.
pub const ROOT_ATTRIBUTES: [&str; 6] = ["specversion", "id", "source", "type", "time", "data"];

/// A CloudEvents-shaped message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Specification version (always [`SPEC_VERSION`] for envelopes built here).
    #[serde(rename = "specversion")]
    pub spec_version: String,

    /// Unique id, generated when the envelope is created.
    pub id: String,

    /// Producer identity.
    pub source: String,

    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Creation time. Optional on the wire, always set on envelopes built here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Payload. Absence is treated as "field not found" by every path operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Extension attributes, carried through untouched.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl MessageEnvelope {
    /// Build a fresh envelope with a new id and the current time.
    #[must_use]
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            event_type: event_type.into(),
            time: Some(Utc::now()),
            data: Some(data),
            extensions: Map::new(),
        }
    }

    /// Decode an envelope from a delivery payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        serde_json::from_slice(payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }

    /// Encode the envelope for publishing.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Copy of this envelope with `data` replaced; id, source, type, time and
    /// extensions are preserved.
    #[must_use]
    pub fn with_data(&self, data: Value) -> Self {
        Self {
            data: Some(data),
            ..self.clone()
        }
    }

    /// The payload as a JSON object, if it is one.
    #[must_use]
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }

    /// Resolve a path relative to `data`.
    #[must_use]
    pub fn resolve_in_data(&self, path: &FieldPath) -> Option<&Value> {
        self.data.as_ref().and_then(|data| path.resolve(data))
    }

    /// Resolve a path from the envelope root.
    ///
    /// The first segment names a root attribute (`id`, `source`, `data`, ...
    /// or an extension); a leading `message` segment is skipped. Any unknown
    /// root attribute resolves to `None`.
    #[must_use]
    pub fn resolve(&self, path: &FieldPath) -> Option<Cow<'_, Value>> {
        let mut segments = path.segments();
        let mut head = segments.first()?;
        if head.as_key() == Some("message") {
            segments = &segments[1..];
            head = segments.first()?;
        }
        let rest = &segments[1..];

        let root: Cow<'_, Value> = match head.as_key()? {
            "specversion" => Cow::Owned(Value::String(self.spec_version.clone())),
            "id" => Cow::Owned(Value::String(self.id.clone())),
            "source" => Cow::Owned(Value::String(self.source.clone())),
            "type" => Cow::Owned(Value::String(self.event_type.clone())),
            "time" => Cow::Owned(Value::String(
                self.time?.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            "data" => Cow::Borrowed(self.data.as_ref()?),
            other => Cow::Borrowed(self.extensions.get(other)?),
        };

        if rest.is_empty() {
            return Some(root);
        }
        match root {
            Cow::Borrowed(value) => FieldPath::resolve_segments(value, rest).map(Cow::Borrowed),
            // Scalar root attributes have no children.
            Cow::Owned(_) => None,
        }
    }
}

/// The `source` / `type` pair stamped on envelopes a filter creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeIdentity {
    /// Value for `source`.
    pub source: String,
    /// Value for `type`.
    pub event_type: String,
}

impl EnvelopeIdentity {
    /// Create an identity.
    pub fn new(source: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
        }
    }

    /// Default identity for a filter kind: `eip-filters/<kind>` / `eip.<kind>`.
    pub fn for_filter(kind: &str) -> Self {
        Self::new(format!("eip-filters/{kind}"), format!("eip.{kind}"))
    }

    /// Build a new envelope carrying `data` under this identity.
    #[must_use]
    pub fn stamp(&self, data: Value) -> MessageEnvelope {
        MessageEnvelope::new(self.source.clone(), self.event_type.clone(), data)
    }
}
