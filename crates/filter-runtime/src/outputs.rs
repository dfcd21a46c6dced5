//! Destination resolution for emitted envelopes.
//!
//! [`Destination::Primary`] is the first configured output. A named
//! destination matches a configured output by pipe name; an unlisted name
//! becomes a queue of that name at the input pipe's broker address.

use std::borrow::Cow;

use shared_types::{ConfigurationError, Destination, PipeDescriptor};

/// The outputs of one runner.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSet {
    outputs: Vec<PipeDescriptor>,
    fallback_address: Option<String>,
}

impl OutputSet {
    /// Outputs plus the address used for unlisted destination names.
    #[must_use]
    pub fn new(outputs: Vec<PipeDescriptor>, fallback_address: Option<String>) -> Self {
        Self {
            outputs,
            fallback_address,
        }
    }

    /// The configured outputs.
    #[must_use]
    pub fn outputs(&self) -> &[PipeDescriptor] {
        &self.outputs
    }

    /// First configured output.
    #[must_use]
    pub fn primary(&self) -> Option<&PipeDescriptor> {
        self.outputs.first()
    }

    /// The configured output named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PipeDescriptor> {
        self.outputs.iter().find(|output| output.name == name)
    }

    /// Where an emission goes.
    pub fn resolve(
        &self,
        destination: &Destination,
    ) -> Result<Cow<'_, PipeDescriptor>, ConfigurationError> {
        match destination {
            Destination::Primary => self
                .primary()
                .map(Cow::Borrowed)
                .ok_or_else(|| ConfigurationError::Missing("EIP_OUT".into())),
            Destination::Named(name) => {
                if let Some(output) = self.find(name) {
                    return Ok(Cow::Borrowed(output));
                }
                self.fallback_address
                    .as_ref()
                    .map(|address| Cow::Owned(PipeDescriptor::queue(address.clone(), name.clone())))
                    .ok_or_else(|| {
                        ConfigurationError::invalid(
                            "destination",
                            format!("'{name}' is not a configured output"),
                        )
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::PipeKind;

    fn set() -> OutputSet {
        OutputSet::new(
            vec![
                PipeDescriptor::queue("amqp://out", "first"),
                PipeDescriptor::topic("amqp://out", "alerts", "alert.high"),
            ],
            Some("amqp://in".into()),
        )
    }

    #[test]
    fn test_primary_is_first_output() {
        assert_eq!(
            set().resolve(&Destination::Primary).unwrap().name,
            "first"
        );
        let empty = OutputSet::new(Vec::new(), None);
        assert_eq!(
            empty.resolve(&Destination::Primary).unwrap_err(),
            ConfigurationError::Missing("EIP_OUT".into())
        );
    }

    #[test]
    fn test_named_matches_configured_output() {
        let set = set();
        let target = set.resolve(&Destination::Named("alerts".into())).unwrap();
        assert_eq!(target.kind, PipeKind::Topic);
        assert_eq!(target.routing_key(), Some("alert.high"));
    }

    #[test]
    fn test_unlisted_name_falls_back_to_input_address_queue() {
        let target = set()
            .resolve(&Destination::Named("overflow".into()))
            .unwrap()
            .into_owned();
        assert_eq!(target, PipeDescriptor::queue("amqp://in", "overflow"));

        let no_fallback = OutputSet::new(Vec::new(), None);
        assert!(no_fallback
            .resolve(&Destination::Named("overflow".into()))
            .is_err());
    }
}
