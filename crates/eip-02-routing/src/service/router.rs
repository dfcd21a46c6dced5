//! Content-based router and recipient list.
//!
//! Both forward the input envelope unchanged; they differ only in the
//! [`RoutingMode`] applied to the table.

use shared_types::{Disposition, Emission, FilterError, MessageEnvelope, MessageFilter};
use tracing::debug;

use crate::domain::{RoutingMode, RoutingTable};

/// Router filter over a [`RoutingTable`].
#[derive(Debug, Clone)]
pub struct ContentRouter {
    name: String,
    table: RoutingTable,
    mode: RoutingMode,
}

impl ContentRouter {
    /// Router with an explicit mode.
    pub fn new(name: impl Into<String>, table: RoutingTable, mode: RoutingMode) -> Self {
        Self {
            name: name.into(),
            table,
            mode,
        }
    }

    /// First-match router (`content-based-router`).
    #[must_use]
    pub fn content_based(table: RoutingTable) -> Self {
        Self::new("content-based-router", table, RoutingMode::Single)
    }

    /// All-matches router (`recipient-list`).
    #[must_use]
    pub fn recipient_list(table: RoutingTable) -> Self {
        Self::new("recipient-list", table, RoutingMode::Multiple)
    }

    /// The routing table.
    #[must_use]
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// The routing mode.
    #[must_use]
    pub fn mode(&self) -> RoutingMode {
        self.mode
    }
}

impl MessageFilter for ContentRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, message: MessageEnvelope) -> Result<Disposition, FilterError> {
        let destinations: Vec<String> = self
            .table
            .route(self.mode, &message)?
            .into_iter()
            .map(str::to_string)
            .collect();

        debug!(
            filter = %self.name,
            id = %message.id,
            mode = %self.mode,
            destinations = ?destinations,
            "Message routed"
        );

        let Some((last, rest)) = destinations.split_last() else {
            return Ok(Disposition::Emit(Vec::new()));
        };
        let mut emissions: Vec<Emission> = rest
            .iter()
            .map(|destination| Emission::named(destination.clone(), message.clone()))
            .collect();
        emissions.push(Emission::named(last.clone(), message));
        Ok(Disposition::Emit(emissions))
    }
}
