use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to read input CSV '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Required column '{0}' not found in input")]
    MissingColumn(String),

    #[error("Column '{column}' has unsupported dtype {dtype} for date parsing")]
    UnsupportedDateColumn { column: String, dtype: String },

    #[error("Failed processing input frame: {0}")]
    FrameProcessing(#[from] PolarsError),
}
