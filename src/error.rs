use crate::calendar::error::CalendarError;
use crate::enrich::error::EnrichError;
use crate::records::error::RecordError;
use crate::spatial::error::SpatialError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoEnrichError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Failed to write output to '{0}'")]
    OutputWrite(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
