//! Multi-source enrichment: key derivation, bounded-concurrency fetch and
//! keyed merge of weather, land-cover and amenity signals.

pub mod error;
pub mod key;
pub mod orchestrator;
pub mod outcome;
pub mod providers;
