use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Failed to read holiday file '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Required column '{0}' not found in holiday file")]
    MissingColumn(String),

    #[error("Failed processing holiday frame: {0}")]
    FrameProcessing(#[from] PolarsError),
}
