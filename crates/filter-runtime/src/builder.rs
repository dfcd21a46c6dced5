//! Filter construction from a [`RuntimeConfig`].
//!
//! Every document is parsed and every expression compiled here, before the
//! runner connects, so a bad configuration never reaches the broker.

use eip_02_routing::{ContentRouter, GateRules, PredicateFilter, RoutingTable};
use eip_03_buffering::{AggregatorConfig, BufferingFilter, ResequencerConfig};
use eip_04_transformation::{
    ContentFilter, ContentFilterConfig, Splitter, SplitterConfig, Translator, TranslatorConfig,
};
use shared_types::{ConfigurationError, MessageFilter};
use tracing::{info, warn};

use crate::config::{FilterKind, RuntimeConfig};
use crate::taps::{Receiver, WireTap};

/// Build the filter named by `config.kind`.
///
/// # Errors
///
/// [`ConfigurationError`] for a missing or invalid document, and for
/// [`FilterKind::Sender`], which is a source rather than a filter.
pub fn build_filter(config: &RuntimeConfig) -> Result<Box<dyn MessageFilter>, ConfigurationError> {
    let filter: Box<dyn MessageFilter> = match config.kind {
        FilterKind::Router | FilterKind::ContentBasedRouter | FilterKind::RecipientList => {
            let table = RoutingTable::from_json(config.document()?)?;
            for destination in table.destinations() {
                if config.outputs.iter().all(|output| output.name != destination) {
                    warn!(
                        destination,
                        "Destination is not a configured output; using a queue at the input address"
                    );
                }
            }
            Box::new(ContentRouter::new(config.kind.as_str(), table, config.mode))
        }
        FilterKind::MessageFilter => {
            Box::new(PredicateFilter::new(GateRules::from_json(config.document()?)?))
        }
        FilterKind::Aggregator => Box::new(BufferingFilter::aggregator(
            AggregatorConfig::from_json(config.document()?)?,
            config.identity.clone(),
        )?),
        FilterKind::Resequencer => Box::new(BufferingFilter::resequencer(
            ResequencerConfig::from_json(config.document()?)?,
        )?),
        FilterKind::Splitter => Box::new(Splitter::new(
            SplitterConfig::from_json(config.document()?)?,
            config.identity.clone(),
        )),
        FilterKind::ContentFilter => Box::new(ContentFilter::new(ContentFilterConfig::from_json(
            config.document()?,
        )?)),
        FilterKind::Translator => Box::new(Translator::new(
            TranslatorConfig::from_json(config.document()?)?,
            config.envelope_policy,
            config.identity.clone(),
        )),
        FilterKind::Logger => Box::new(WireTap),
        FilterKind::Receiver => Box::new(Receiver),
        FilterKind::Sender => {
            return Err(ConfigurationError::invalid(
                "EIP_FILTER",
                "sender has no input and is not driven by a runner",
            ))
        }
    };

    info!(kind = %config.kind, filter = %filter.name(), "Filter built");
    Ok(filter)
}
