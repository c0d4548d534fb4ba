//! CropSense recommendation engine
//!
//! A static rule-based scorer ranks candidate crops for a soil/season/climate
//! input; the top results are enriched through the [`enrich::Enricher`]
//! capability, which guarantees a bounded-latency answer by falling back to a
//! deterministic payload when the language model misbehaves.

pub mod crops;
pub mod enrich;
pub mod scorer;
pub mod types;

pub use enrich::{EnrichContext, EnrichedCrop, Enricher, FallbackEnricher, OpenAiEnricher};
pub use scorer::{score, top_items, ScoredCrop};
pub use types::*;
