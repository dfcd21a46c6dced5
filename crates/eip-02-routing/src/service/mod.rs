//! Service layer: routing filters driven by the runner.

pub mod message_filter;
pub mod router;

pub use message_filter::PredicateFilter;
pub use router::ContentRouter;
