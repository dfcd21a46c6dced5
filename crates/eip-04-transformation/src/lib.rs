//! # EIP-04 Transformation
//!
//! Stateless filters that reshape message content.
//!
//! - `Splitter`: one new envelope per configured field present in `data`
//! - `ContentFilter`: removes configured fields from `data` in place
//! - `Translator`: builds a new `data` object from extraction expressions
//!
//! Paths in splitter and content-filter documents are relative to `data`;
//! translator expressions address the envelope root (`data.a`, `source`).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod content_filter;
pub mod splitter;
pub mod translator;

// Re-exports for convenience
pub use config::{ContentFilterConfig, EnvelopePolicy, SplitterConfig, TranslatorConfig};
pub use content_filter::ContentFilter;
pub use splitter::Splitter;
pub use translator::Translator;
