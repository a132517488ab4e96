//! Hexagonal cell indexing and administrative-region filtering.

pub mod districts;
pub mod error;
pub mod index;
