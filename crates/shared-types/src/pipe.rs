//! # Pipe Descriptors
//!
//! A pipe is a named broker destination: either a work queue or a topic
//! exchange addressed with a routing key.
//!
//! ## String Format
//!
//! ```text
//! address,name[,kind]      kind ∈ {queue, topic}, omitted ⇒ queue
//! ```
//!
//! ## Routing Keys
//!
//! - A Queue ignores its routing key entirely.
//! - A Topic always carries one. When none is configured it defaults to
//!   [`DEFAULT_INPUT_ROUTING_KEY`] on the consumer side and
//!   [`DEFAULT_OUTPUT_ROUTING_KEY`] on the producer side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Binding key used for topic inputs when none is configured (match everything).
pub const DEFAULT_INPUT_ROUTING_KEY: &str = "#";

/// Publish key used for topic outputs when none is configured.
pub const DEFAULT_OUTPUT_ROUTING_KEY: &str = "";

/// Destination kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeKind {
    /// Point-to-point, competing-consumer queue.
    Queue,
    /// Publish/subscribe topic exchange.
    Topic,
}

impl PipeKind {
    /// Lowercase name as used in descriptor strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PipeKind::Queue => "queue",
            PipeKind::Topic => "topic",
        }
    }
}

impl fmt::Display for PipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipeKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(PipeKind::Queue),
            "topic" => Ok(PipeKind::Topic),
            other => Err(ConfigurationError::UnknownPipeKind(other.to_string())),
        }
    }
}

/// Which side of a pipe a descriptor is used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeRole {
    /// Consumes deliveries from the pipe.
    Consumer,
    /// Publishes payloads to the pipe.
    Producer,
}

impl PipeRole {
    /// Routing key a topic gets when none is configured for this role.
    #[must_use]
    pub fn default_routing_key(self) -> &'static str {
        match self {
            PipeRole::Consumer => DEFAULT_INPUT_ROUTING_KEY,
            PipeRole::Producer => DEFAULT_OUTPUT_ROUTING_KEY,
        }
    }
}

/// A broker destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeDescriptor {
    /// Transport-level location of the broker (e.g. `amqp://host:5672`).
    pub address: String,
    /// Queue or exchange name.
    pub name: String,
    /// Queue or topic.
    pub kind: PipeKind,
    routing_key: Option<String>,
}

impl PipeDescriptor {
    /// A queue descriptor.
    pub fn queue(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            kind: PipeKind::Queue,
            routing_key: None,
        }
    }

    /// A topic descriptor with an explicit routing key.
    pub fn topic(
        address: impl Into<String>,
        name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            kind: PipeKind::Topic,
            routing_key: Some(routing_key.into()),
        }
    }

    /// Parse `address,name[,kind]` and fill the routing key for `role`.
    ///
    /// `routing_key` is only consulted for topics; `None` selects the role default.
    pub fn parse(
        raw: &str,
        role: PipeRole,
        routing_key: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        let malformed = |reason: &str| ConfigurationError::MalformedDescriptor {
            descriptor: raw.to_string(),
            reason: reason.to_string(),
        };

        let (address, name, kind) = match parts.as_slice() {
            [address, name] => (*address, *name, PipeKind::Queue),
            [address, name, kind] => (*address, *name, kind.parse::<PipeKind>()?),
            _ => return Err(malformed("expected `address,name[,kind]`")),
        };
        if address.is_empty() {
            return Err(malformed("address is empty"));
        }
        if name.is_empty() {
            return Err(malformed("name is empty"));
        }

        Ok(match kind {
            PipeKind::Queue => Self::queue(address, name),
            PipeKind::Topic => Self::topic(
                address,
                name,
                routing_key.unwrap_or_else(|| role.default_routing_key()),
            ),
        })
    }

    /// Parse a `;`-separated list of descriptors (blank entries are skipped).
    pub fn parse_list(
        raw: &str,
        role: PipeRole,
        routing_key: Option<&str>,
    ) -> Result<Vec<Self>, ConfigurationError> {
        raw.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| Self::parse(entry, role, routing_key))
            .collect()
    }

    /// Routing key; always `None` for queues.
    #[must_use]
    pub fn routing_key(&self) -> Option<&str> {
        match self.kind {
            PipeKind::Queue => None,
            PipeKind::Topic => self.routing_key.as_deref(),
        }
    }

    /// Return a copy bound to a different routing key (topics only).
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        if self.kind == PipeKind::Topic {
            self.routing_key = Some(routing_key.into());
        }
        self
    }
}

impl fmt::Display for PipeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.routing_key() {
            Some(key) => write!(f, "{}/{} [{}:{}]", self.address, self.name, self.kind, key),
            None => write!(f, "{}/{} [{}]", self.address, self.name, self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_without_kind() {
        let pipe = PipeDescriptor::parse("amqp://broker,orders", PipeRole::Consumer, None).unwrap();
        assert_eq!(pipe.address, "amqp://broker");
        assert_eq!(pipe.name, "orders");
        assert_eq!(pipe.kind, PipeKind::Queue);
        assert_eq!(pipe.routing_key(), None);
    }

    #[test]
    fn test_queue_ignores_routing_key() {
        let pipe =
            PipeDescriptor::parse("amqp://broker,orders,queue", PipeRole::Producer, Some("k"))
                .unwrap();
        assert_eq!(pipe.routing_key(), None);
        assert_eq!(pipe.clone().with_routing_key("x").routing_key(), None);
    }

    #[test]
    fn test_topic_routing_key_defaults_by_role() {
        let input = PipeDescriptor::parse("amqp://b,events,topic", PipeRole::Consumer, None).unwrap();
        assert_eq!(input.routing_key(), Some("#"));

        let output =
            PipeDescriptor::parse("amqp://b,events,topic", PipeRole::Producer, None).unwrap();
        assert_eq!(output.routing_key(), Some(""));

        let keyed = PipeDescriptor::parse(
            "amqp://b,events,TOPIC",
            PipeRole::Consumer,
            Some("sensor.*"),
        )
        .unwrap();
        assert_eq!(keyed.routing_key(), Some("sensor.*"));
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let err = PipeDescriptor::parse("amqp://b,x,fanout", PipeRole::Consumer, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownPipeKind(kind) if kind == "fanout"));
    }

    #[test]
    fn test_malformed_descriptors() {
        for raw in ["", "only-address", "a,b,queue,extra", ",name", "addr,"] {
            assert!(
                PipeDescriptor::parse(raw, PipeRole::Producer, None).is_err(),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_list() {
        let pipes = PipeDescriptor::parse_list(
            "amqp://b,one; amqp://b,two,topic ;",
            PipeRole::Producer,
            Some("rk"),
        )
        .unwrap();
        assert_eq!(pipes.len(), 2);
        assert_eq!(pipes[0].name, "one");
        assert_eq!(pipes[1].routing_key(), Some("rk"));
    }
}
