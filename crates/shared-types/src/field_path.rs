//! # Field Paths
//!
//! Dotted paths into nested message data (`"b.c"` addresses `data["b"]["c"]`).
//!
//! Resolution never fails: an absent segment, or a segment applied to
//! something that is not a mapping, resolves to `None` ("field not found").
//! Index segments (`items[0]`) are only produced by the rule-engine parser;
//! dotted configuration strings contain keys only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::ConfigurationError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key.
    Key(String),
    /// Array position.
    Index(usize),
}

impl Segment {
    /// The key, if this is a key segment.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A parsed, non-empty path into nested JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a dotted path. Empty paths and empty segments (`"a..b"`) are rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationError::InvalidFieldPath {
                path: raw.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            if part.is_empty() {
                return Err(ConfigurationError::InvalidFieldPath {
                    path: raw.to_string(),
                    reason: "empty segment".to_string(),
                });
            }
            segments.push(Segment::Key(part.to_string()));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Build a path from already-parsed segments.
    ///
    /// Returns `None` for an empty segment list.
    #[must_use]
    pub fn from_segments(segments: Vec<Segment>) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        let mut raw = String::new();
        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        raw.push('.');
                    }
                    raw.push_str(key);
                }
                Segment::Index(index) => {
                    raw.push('[');
                    raw.push_str(&index.to_string());
                    raw.push(']');
                }
            }
        }
        Some(Self { raw, segments })
    }

    /// The path as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The final segment (used as the output key by the splitter).
    #[must_use]
    pub fn last_segment(&self) -> &Segment {
        // Invariant: constructors never produce an empty path.
        &self.segments[self.segments.len() - 1]
    }

    /// Walk `root` along this path.
    #[must_use]
    pub fn resolve<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        Self::resolve_segments(root, &self.segments)
    }

    /// Walk `root` along an arbitrary segment slice.
    #[must_use]
    pub fn resolve_segments<'v>(root: &'v Value, segments: &[Segment]) -> Option<&'v Value> {
        segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            })
    }

    /// Whether this path resolves to a present value.
    #[must_use]
    pub fn exists_in(&self, root: &Value) -> bool {
        self.resolve(root).is_some()
    }

    /// Remove the addressed key from `root` in place, returning the removed value.
    ///
    /// Absent paths are a no-op. Only key segments can be removed.
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = root;
        for segment in parents {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        match (last, current) {
            (Segment::Key(key), Value::Object(map)) => map.remove(key),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
