//! # Resequencer
//!
//! Buffers every message and, on flush, re-emits the batch individually in
//! ascending order of one field.
//!
//! ## Ordering
//!
//! The sort field resolves from the envelope root (`data.seq`, `time`, ...).
//! Keys order as follows:
//!
//! 1. Numbers, compared numerically.
//! 2. Strings, compared lexicographically. Other present values (booleans,
//!    `null`, arrays, objects) compare by their JSON text in the same class.
//! 3. Messages whose field is absent, last.
//!
//! A number and a string are not compared as text: every number sorts
//! before every string, whatever their digits. Mixing numeric and textual
//! comparison across pairs is not transitive (`9 < 10`, `"10" < "9"`), and
//! the sort needs a total order.
//!
//! The sort is stable: equal keys keep arrival order.

use std::cmp::Ordering;

use serde_json::Value;
use shared_types::{Emission, FieldPath, MessageEnvelope};

use super::strategy::BatchStrategy;

/// Sort key extracted from one message.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Numeric value.
    Number(f64),
    /// String value, or the JSON text of a non-numeric, non-string value.
    Text(String),
    /// The field is absent.
    Missing,
}

impl SortKey {
    /// Key for a resolved value.
    #[must_use]
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => SortKey::Missing,
            Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
            Some(Value::String(s)) => SortKey::Text(s.clone()),
            Some(other) => SortKey::Text(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Text(_) => 1,
            SortKey::Missing => 2,
        }
    }
}

impl Eq for SortKey {}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Group-sort-release strategy.
#[derive(Debug, Clone)]
pub struct Resequencer {
    field: FieldPath,
}

impl Resequencer {
    /// Resequencer sorting by `field`.
    #[must_use]
    pub fn new(field: FieldPath) -> Self {
        Self { field }
    }

    /// Configured sort field.
    #[must_use]
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    /// Sort key of one message.
    #[must_use]
    pub fn key_of(&self, message: &MessageEnvelope) -> SortKey {
        SortKey::of(message.resolve(&self.field).as_deref())
    }

    /// Order a batch.
    #[must_use]
    pub fn sort(&self, batch: Vec<MessageEnvelope>) -> Vec<MessageEnvelope> {
        let mut keyed: Vec<(SortKey, MessageEnvelope)> = batch
            .into_iter()
            .map(|message| (self.key_of(&message), message))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, message)| message).collect()
    }
}

impl BatchStrategy for Resequencer {
    fn kind(&self) -> &'static str {
        "resequencer"
    }

    fn admit(&self, _message: &MessageEnvelope) -> bool {
        true
    }

    fn flush(&self, batch: Vec<MessageEnvelope>) -> Vec<Emission> {
        self.sort(batch).into_iter().map(Emission::primary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_seq(seq: Value, tag: &str) -> MessageEnvelope {
        MessageEnvelope::new("s", "t", json!({ "seq": seq, "tag": tag }))
    }

    fn tags(batch: &[MessageEnvelope]) -> Vec<String> {
        batch
            .iter()
            .map(|m| m.data.as_ref().unwrap()["tag"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_numeric_sort() {
        let reseq = Resequencer::new(FieldPath::parse("data.seq").unwrap());
        let sorted = reseq.sort(vec![
            with_seq(json!(10), "ten"),
            with_seq(json!(9), "nine"),
            with_seq(json!(-1.5), "neg"),
        ]);
        assert_eq!(tags(&sorted), vec!["neg", "nine", "ten"]);
    }

    #[test]
    fn test_mixed_keys_numbers_then_text_then_missing() {
        let reseq = Resequencer::new(FieldPath::parse("data.seq").unwrap());
        let sorted = reseq.sort(vec![
            MessageEnvelope::new("s", "t", json!({ "tag": "none" })),
            with_seq(json!("b"), "b"),
            with_seq(json!(2), "two"),
            with_seq(json!("a"), "a"),
            with_seq(json!(1), "one"),
        ]);
        assert_eq!(tags(&sorted), vec!["one", "two", "a", "b", "none"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let reseq = Resequencer::new(FieldPath::parse("data.seq").unwrap());
        let sorted = reseq.sort(vec![
            with_seq(json!(1), "first"),
            MessageEnvelope::new("s", "t", json!({ "tag": "x" })),
            with_seq(json!(1), "second"),
            MessageEnvelope::new("s", "t", json!({ "tag": "y" })),
        ]);
        assert_eq!(tags(&sorted), vec!["first", "second", "x", "y"]);
    }

    #[test]
    fn test_root_attributes_are_sortable() {
        let reseq = Resequencer::new(FieldPath::parse("source").unwrap());
        let sorted = reseq.sort(vec![
            MessageEnvelope::new("zeta", "t", json!({ "tag": "z" })),
            MessageEnvelope::new("alpha", "t", json!({ "tag": "a" })),
        ]);
        assert_eq!(tags(&sorted), vec!["a", "z"]);
    }

    #[test]
    fn test_sort_key_order() {
        assert!(SortKey::Number(100.0) < SortKey::Text("0".into()));
        assert!(SortKey::Text("zzz".into()) < SortKey::Missing);
        assert_eq!(SortKey::of(Some(&json!(true))), SortKey::Text("true".into()));
    }
}
