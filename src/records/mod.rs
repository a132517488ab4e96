//! Input event records and the normalization applied before spatial indexing.

pub mod error;
pub mod frame;
pub mod normalize;

use chrono::NaiveDate;
use h3o::CellIndex;

/// One input event, projected out of the raw input frame.
///
/// The event-specific payload columns stay behind in the original
/// [`polars::frame::DataFrame`] and are rejoined by `row_id` when the
/// enriched output is written. A record whose coordinates were missing in
/// the input carries the 0.0/0.0 sentinel and never receives a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable position of the record in the input file, used as the join key
    /// between the original frame and the enrichment columns.
    pub row_id: i64,
    pub lat: f64,
    pub lon: f64,
    /// `None` when the input value was absent or unparseable; such records
    /// are kept but all date-dependent features resolve to null.
    pub event_date: Option<NaiveDate>,
    /// Assigned by the spatial indexer; `None` for sentinel coordinates.
    pub cell: Option<CellIndex>,
}
