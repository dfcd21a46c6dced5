//! Domain layer: routing decisions, no I/O.

pub mod gate;
pub mod table;

pub use gate::{GateRule, GateRules};
pub use table::{RoutingConfig, RoutingMode, RoutingTable, Rule};
