//! Calendar-derived features: holiday and long-weekend flags, lunar phase.

pub mod error;
pub mod holidays;
pub mod moon;
