//! Builds the enriched per-region frame and writes it out.
//!
//! The enrichment columns are assembled per record, unit-converted, and
//! joined back onto the original input frame by `row_id` so every payload
//! column survives untouched. Records whose key has no fetched result get
//! the per-kind default instead of being dropped.

use crate::calendar::holidays::HolidayCalendar;
use crate::calendar::moon::moon_phase;
use crate::enrich::orchestrator::DistrictEnrichment;
use crate::enrich::outcome::FetchOutcome;
use crate::error::GeoEnrichError;
use crate::records::Record;
use crate::spatial::index::HexIndexer;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Rounds to 2 decimal places, the precision of the published columns.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn kelvin_to_celsius(value: f64) -> f64 {
    round2(value - 273.15)
}

fn meters_to_centimeters(value: f64) -> f64 {
    round2(value * 100.0)
}

/// Assembles the enriched frame for one region.
///
/// One output row per surviving record: the original columns joined by
/// `row_id`, plus the documented enrichment set (`cell_id`,
/// `centroid_lat`, `centroid_lon`, the converted weather metrics,
/// `land_cover_percentage`, `amenity_count`, `is_holiday`,
/// `is_long_weekend`, `moon_phase`, `region_name`).
pub fn build_region_frame(
    original: &DataFrame,
    region_name: &str,
    records: &[Record],
    enrichment: &DistrictEnrichment,
    calendar: &HolidayCalendar,
) -> Result<DataFrame, GeoEnrichError> {
    let n = records.len();
    let mut row_ids = Vec::with_capacity(n);
    let mut cell_ids: Vec<Option<String>> = Vec::with_capacity(n);
    let mut centroid_lats: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut centroid_lons: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut temperature_max: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut temperature_min: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut precipitation: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut wind_speed: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut land_cover: Vec<f64> = Vec::with_capacity(n);
    let mut amenity_count: Vec<i64> = Vec::with_capacity(n);
    let mut is_holiday: Vec<Option<i32>> = Vec::with_capacity(n);
    let mut is_long_weekend: Vec<Option<i32>> = Vec::with_capacity(n);
    let mut moon: Vec<Option<f64>> = Vec::with_capacity(n);

    for record in records {
        row_ids.push(record.row_id);

        let centroid = record.cell.map(HexIndexer::centroid);
        cell_ids.push(record.cell.map(|cell| cell.to_string()));
        centroid_lats.push(centroid.map(|c| c.0));
        centroid_lons.push(centroid.map(|c| c.1));

        let weather = record
            .cell
            .zip(record.event_date)
            .and_then(|key| enrichment.weather.get(&key))
            .and_then(FetchOutcome::fetched);
        temperature_max.push(
            weather
                .and_then(|w| w.temperature_max)
                .map(kelvin_to_celsius),
        );
        temperature_min.push(
            weather
                .and_then(|w| w.temperature_min)
                .map(kelvin_to_celsius),
        );
        precipitation.push(
            weather
                .and_then(|w| w.precipitation_sum)
                .map(meters_to_centimeters),
        );
        wind_speed.push(weather.map(|w| round2(w.wind_speed())));

        land_cover.push(
            record
                .cell
                .and_then(|cell| enrichment.land_cover.get(&cell))
                .and_then(FetchOutcome::fetched)
                .copied()
                .map(round2)
                .unwrap_or(0.0),
        );
        amenity_count.push(
            record
                .cell
                .and_then(|cell| enrichment.amenity.get(&cell))
                .and_then(FetchOutcome::fetched)
                .map(|&count| count as i64)
                .unwrap_or(0),
        );

        is_holiday.push(record.event_date.map(|d| calendar.is_holiday(d) as i32));
        is_long_weekend.push(record.event_date.map(|d| calendar.is_long_weekend(d) as i32));
        moon.push(record.event_date.map(moon_phase));
    }

    let enrichment_frame = DataFrame::new(vec![
        Column::new("row_id".into(), row_ids),
        Column::new("cell_id".into(), cell_ids),
        Column::new("centroid_lat".into(), centroid_lats),
        Column::new("centroid_lon".into(), centroid_lons),
        Column::new("temperature_2m_max".into(), temperature_max),
        Column::new("temperature_2m_min".into(), temperature_min),
        Column::new("total_precipitation_sum".into(), precipitation),
        Column::new("wind_speed".into(), wind_speed),
        Column::new("land_cover_percentage".into(), land_cover),
        Column::new("amenity_count".into(), amenity_count),
        Column::new("is_holiday".into(), is_holiday),
        Column::new("is_long_weekend".into(), is_long_weekend),
        Column::new("moon_phase".into(), moon),
        Column::new("region_name".into(), vec![region_name; n]),
    ])?;

    let joined = original
        .clone()
        .lazy()
        .join(
            enrichment_frame.lazy(),
            [col("row_id")],
            [col("row_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;
    Ok(joined)
}

/// Writes one region's enriched frame as `final_output_{region}.csv`.
pub fn write_region_csv(
    frame: &mut DataFrame,
    output_dir: &Path,
    region_name: &str,
) -> Result<PathBuf, GeoEnrichError> {
    let path = output_dir.join(format!("final_output_{region_name}.csv"));
    let file = std::fs::File::create(&path)
        .map_err(|e| GeoEnrichError::OutputWrite(path.clone(), e))?;
    CsvWriter::new(file).finish(frame)?;
    Ok(path)
}
