use chrono::NaiveDate;
use h3o::CellIndex;
use std::fmt;

/// The deduplication unit for external fetches.
///
/// Static signals (land cover, amenity count) are keyed by cell alone;
/// time-varying signals (weather) by cell and date. The orchestrator issues
/// exactly one external call per distinct key per enrichment kind, so call
/// volume tracks distinct keys rather than record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentKey {
    Cell(CellIndex),
    CellDate(CellIndex, NaiveDate),
}

impl fmt::Display for EnrichmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentKey::Cell(cell) => write!(f, "{cell}"),
            EnrichmentKey::CellDate(cell, date) => write!(f, "{cell}@{date}"),
        }
    }
}
