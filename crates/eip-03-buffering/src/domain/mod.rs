//! Domain layer: buffer state and batch strategies.

pub mod aggregator;
pub mod buffer;
pub mod resequencer;
pub mod strategy;

pub use aggregator::{Aggregator, AGGREGATE_FIELD};
pub use buffer::BufferState;
pub use resequencer::{Resequencer, SortKey};
pub use strategy::BatchStrategy;
