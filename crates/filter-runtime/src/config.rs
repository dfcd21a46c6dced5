//! # Runtime Configuration
//!
//! Everything a filter process needs, read once at startup from environment
//! variables (or any key lookup in tests). Configuration errors are fatal: a
//! runner is never started from an incomplete configuration.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `EIP_FILTER` | filter kind | required |
//! | `EIP_IN` | input `address,name[,kind]` | required except for `sender` |
//! | `EIP_OUT` | `;`-separated outputs, first is primary | see [`FilterKind::requires_output`] |
//! | `EIP_IN_ROUTING_KEY` | topic binding key | `#` |
//! | `EIP_OUT_ROUTING_KEY` | topic publish key | empty |
//! | `EIP_MODE` | router mode `single` / `multiple` | by kind |
//! | `EIP_CONFIG` / `EIP_CONFIG_JSON` | filter document (path / inline) | — |
//! | `EIP_SOURCE`, `EIP_EVENT_TYPE` | identity of created envelopes | `eip-filters/<kind>`, `eip.<kind>` |
//! | `EIP_TRANSLATE_ENVELOPE` | `preserve` / `regenerate` | `preserve` |
//! | `EIP_DECODE_POLICY` | `reject` / `fail` | `reject` |
//! | `EIP_INTERVAL_MS` | sender period | `1000` |
//! | `EIP_DATA` | sender payload (JSON object) | required for `sender` |

use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use eip_02_routing::RoutingMode;
use eip_04_transformation::EnvelopePolicy;
use serde_json::Value;
use shared_types::{ConfigurationError, EnvelopeIdentity, PipeDescriptor, PipeRole};

use crate::runner::DecodePolicy;

/// Default sender period.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// The filter a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Router whose mode comes from `EIP_MODE` (default `single`).
    Router,
    /// First-match router.
    ContentBasedRouter,
    /// All-matches router.
    RecipientList,
    /// Predicate gate.
    MessageFilter,
    /// Count-triggered aggregation.
    Aggregator,
    /// Count-triggered reordering.
    Resequencer,
    /// One output per configured field.
    Splitter,
    /// Field removal.
    ContentFilter,
    /// Expression-driven data rewrite.
    Translator,
    /// Wire tap: log and forward.
    Logger,
    /// Sink: log and acknowledge.
    Receiver,
    /// Source: periodic publisher.
    Sender,
}

impl FilterKind {
    /// All kinds, in documentation order.
    pub const ALL: [FilterKind; 12] = [
        FilterKind::Router,
        FilterKind::ContentBasedRouter,
        FilterKind::RecipientList,
        FilterKind::MessageFilter,
        FilterKind::Aggregator,
        FilterKind::Resequencer,
        FilterKind::Splitter,
        FilterKind::ContentFilter,
        FilterKind::Translator,
        FilterKind::Logger,
        FilterKind::Receiver,
        FilterKind::Sender,
    ];

    /// Configuration spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Router => "router",
            FilterKind::ContentBasedRouter => "content-based-router",
            FilterKind::RecipientList => "recipient-list",
            FilterKind::MessageFilter => "message-filter",
            FilterKind::Aggregator => "aggregator",
            FilterKind::Resequencer => "resequencer",
            FilterKind::Splitter => "splitter",
            FilterKind::ContentFilter => "content-filter",
            FilterKind::Translator => "translator",
            FilterKind::Logger => "logger",
            FilterKind::Receiver => "receiver",
            FilterKind::Sender => "sender",
        }
    }

    /// Whether this kind routes by destination name.
    #[must_use]
    pub fn is_router(self) -> bool {
        matches!(
            self,
            FilterKind::Router | FilterKind::ContentBasedRouter | FilterKind::RecipientList
        )
    }

    /// Whether this kind reads a configuration document.
    #[must_use]
    pub fn requires_document(self) -> bool {
        !matches!(
            self,
            FilterKind::Logger | FilterKind::Receiver | FilterKind::Sender
        )
    }

    /// Whether `EIP_OUT` must name at least one pipe. Routers may rely on the
    /// input-address fallback and receivers publish nothing.
    #[must_use]
    pub fn requires_output(self) -> bool {
        !self.is_router() && self != FilterKind::Receiver
    }

    /// Router mode implied by the kind.
    #[must_use]
    pub fn default_mode(self) -> RoutingMode {
        match self {
            FilterKind::RecipientList => RoutingMode::Multiple,
            _ => RoutingMode::Single,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                ConfigurationError::invalid("EIP_FILTER", format!("unknown filter kind '{s}'"))
            })
    }
}

/// Complete configuration of one filter process.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Filter kind.
    pub kind: FilterKind,
    /// Input pipe (absent only for the sender).
    pub input: Option<PipeDescriptor>,
    /// Output pipes; the first is the primary output.
    pub outputs: Vec<PipeDescriptor>,
    /// Router mode.
    pub mode: RoutingMode,
    /// Raw filter document.
    pub document: Option<String>,
    /// Identity stamped on envelopes the filter creates.
    pub identity: EnvelopeIdentity,
    /// Translator envelope policy.
    pub envelope_policy: EnvelopePolicy,
    /// What to do with payloads that are not envelopes.
    pub decode_policy: DecodePolicy,
    /// Sender period.
    pub interval: Duration,
    /// Sender payload.
    pub sender_data: Option<Value>,
}

impl RuntimeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration from a key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigurationError::Missing(key.into()));

        let kind: FilterKind = require("EIP_FILTER")?.parse()?;

        let in_key = get("EIP_IN_ROUTING_KEY");
        let input = match get("EIP_IN") {
            Some(raw) => Some(PipeDescriptor::parse(
                &raw,
                PipeRole::Consumer,
                in_key.as_deref(),
            )?),
            None if kind == FilterKind::Sender => None,
            None => return Err(ConfigurationError::Missing("EIP_IN".into())),
        };

        let out_key = get("EIP_OUT_ROUTING_KEY");
        let outputs = match get("EIP_OUT") {
            Some(raw) => PipeDescriptor::parse_list(&raw, PipeRole::Producer, out_key.as_deref())?,
            None => Vec::new(),
        };
        if outputs.is_empty() && kind.requires_output() {
            return Err(ConfigurationError::Missing("EIP_OUT".into()));
        }

        let mode = match get("EIP_MODE") {
            Some(raw) => raw.parse()?,
            None => kind.default_mode(),
        };

        let document = match (get("EIP_CONFIG_JSON"), get("EIP_CONFIG")) {
            (Some(inline), _) => Some(inline),
            (None, Some(path)) => Some(fs::read_to_string(&path).map_err(|e| {
                ConfigurationError::Document(format!("cannot read {path}: {e}"))
            })?),
            (None, None) => None,
        };
        if document.is_none() && kind.requires_document() {
            return Err(ConfigurationError::Missing(
                "EIP_CONFIG or EIP_CONFIG_JSON".into(),
            ));
        }

        let defaults = EnvelopeIdentity::for_filter(kind.as_str());
        let identity = EnvelopeIdentity::new(
            get("EIP_SOURCE").unwrap_or(defaults.source),
            get("EIP_EVENT_TYPE").unwrap_or(defaults.event_type),
        );

        let envelope_policy = match get("EIP_TRANSLATE_ENVELOPE") {
            Some(raw) => raw.parse()?,
            None => EnvelopePolicy::default(),
        };
        let decode_policy = match get("EIP_DECODE_POLICY") {
            Some(raw) => raw.parse()?,
            None => DecodePolicy::default(),
        };

        let interval_ms = match get("EIP_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    ConfigurationError::invalid("EIP_INTERVAL_MS", "expected a positive integer")
                })?,
            None => DEFAULT_INTERVAL_MS,
        };

        let sender_data = match get("EIP_DATA") {
            Some(raw) => {
                let value: Value = serde_json::from_str(&raw)
                    .map_err(|e| ConfigurationError::invalid("EIP_DATA", e.to_string()))?;
                if !value.is_object() {
                    return Err(ConfigurationError::invalid(
                        "EIP_DATA",
                        "expected a JSON object",
                    ));
                }
                Some(value)
            }
            None if kind == FilterKind::Sender => {
                return Err(ConfigurationError::Missing("EIP_DATA".into()))
            }
            None => None,
        };

        Ok(Self {
            kind,
            input,
            outputs,
            mode,
            document,
            identity,
            envelope_policy,
            decode_policy,
            interval: Duration::from_millis(interval_ms),
            sender_data,
        })
    }

    /// The filter document; an error for kinds that need one and lack it.
    pub fn document(&self) -> Result<&str, ConfigurationError> {
        self.document
            .as_deref()
            .ok_or_else(|| ConfigurationError::Missing("EIP_CONFIG or EIP_CONFIG_JSON".into()))
    }
}
