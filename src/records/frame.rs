//! Loads the input CSV into a polars frame plus a normalized record
//! projection. The original frame keeps every payload column untouched and
//! gains a `row_id` column so the enrichment output can be joined back on.

use crate::records::error::RecordError;
use crate::records::normalize;
use crate::records::Record;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::Path;

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// The loaded input: the original frame (with `row_id` appended and the
/// coordinate columns overwritten with their normalized values) and the
/// per-record projection the pipeline operates on.
#[derive(Debug)]
pub struct RecordBatch {
    pub frame: DataFrame,
    pub records: Vec<Record>,
}

/// Reads the input CSV and produces a [`RecordBatch`].
///
/// Header names have spaces replaced with underscores, `lat`/`lon` are
/// normalized (see [`crate::records::normalize`]) and `date_column` is
/// parsed permissively; unparseable dates become null without dropping the
/// record.
pub fn load_csv(path: &Path, date_column: &str, swapped: bool) -> Result<RecordBatch, RecordError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| RecordError::CsvRead(path.to_path_buf(), e))?
        .finish()
        .map_err(|e| RecordError::CsvRead(path.to_path_buf(), e))?;

    sanitize_column_names(&mut df)?;

    let raw_lat = float_values(&df, "lat")?;
    let raw_lon = float_values(&df, "lon")?;
    let dates = date_values(&df, date_column)?;

    let height = df.height();
    let mut records = Vec::with_capacity(height);
    let mut lat_values = Vec::with_capacity(height);
    let mut lon_values = Vec::with_capacity(height);
    for row in 0..height {
        let (lat, lon) = normalize::normalize_pair(raw_lat[row], raw_lon[row], swapped);
        records.push(Record {
            row_id: row as i64,
            lat,
            lon,
            event_date: dates[row],
            cell: None,
        });
        lat_values.push(lat);
        lon_values.push(lon);
    }

    let row_ids: Vec<i64> = (0..height as i64).collect();
    df.with_column(Column::new("row_id".into(), row_ids))?;
    df.with_column(Column::new("lat".into(), lat_values))?;
    df.with_column(Column::new("lon".into(), lon_values))?;

    Ok(RecordBatch { frame: df, records })
}

/// Tries the known datetime formats first, then date-only formats.
pub fn parse_date_permissive(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

fn sanitize_column_names(df: &mut DataFrame) -> Result<(), RecordError> {
    let renamed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.replace(' ', "_"))
        .collect();
    df.set_column_names(renamed)?;
    Ok(())
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, RecordError> {
    let column = df
        .column(name)
        .map_err(|_| RecordError::MissingColumn(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>, RecordError> {
    let column = df
        .column(name)
        .map_err(|_| RecordError::MissingColumn(name.to_string()))?;
    match column.dtype() {
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|value| value.and_then(parse_date_permissive))
            .collect()),
        DataType::Date => Ok(column.date()?.as_date_iter().collect()),
        DataType::Datetime(_, _) => Ok(column
            .datetime()?
            .as_datetime_iter()
            .map(|value| value.map(|dt| dt.date()))
            .collect()),
        other => Err(RecordError::UnsupportedDateColumn {
            column: name.to_string(),
            dtype: other.to_string(),
        }),
    }
}
