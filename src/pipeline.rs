//! The pipeline client: the main entry point for one enrichment run.

use crate::config::PipelineConfig;
use crate::enrich::key::EnrichmentKey;
use crate::enrich::orchestrator::Orchestrator;
use crate::enrich::providers::{AmenityProvider, LandCoverProvider, WeatherProvider};
use crate::error::GeoEnrichError;
use crate::output;
use crate::records::frame;
use crate::spatial::districts;
use crate::spatial::index::HexIndexer;
use crate::HolidayCalendar;
use bon::bon;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

/// Per-region outcome of a run.
#[derive(Debug)]
pub struct RegionSummary {
    pub name: String,
    pub records: usize,
    /// Every enrichment key whose fetch degraded to a default, so partial
    /// failures stay auditable without blocking the run.
    pub failed_keys: Vec<EnrichmentKey>,
}

/// Outcome of one completed run. A run that reaches this value has written
/// every region's output file, even when individual enrichments failed.
#[derive(Debug)]
pub struct RunSummary {
    pub outputs: Vec<PathBuf>,
    pub total_records: usize,
    pub indexed_records: usize,
    pub regions: Vec<RegionSummary>,
}

/// The enrichment pipeline, scoped to one run.
///
/// Construct it with the three enrichment providers (the production
/// [`crate::EarthEngineClient`] covers both raster-backed kinds), call
/// [`Pipeline::run`], and drop it; nothing persists across runs.
///
/// # Examples
///
/// ```no_run
/// # use geoenrich::{EarthEngineClient, GeoEnrichError, OverpassClient, Pipeline, PipelineConfig};
/// # use std::path::Path;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), GeoEnrichError> {
/// let earth_engine = Arc::new(
///     EarthEngineClient::builder()
///         .base_url("https://earthengine.example.net")
///         .build(),
/// );
/// let pipeline = Pipeline::builder()
///     .config(
///         PipelineConfig::builder()
///             .districts_of_interest(vec!["Ahmadabad".to_string(), "Delhi".to_string()])
///             .build(),
///     )
///     .weather(earth_engine.clone())
///     .land_cover(earth_engine)
///     .amenity(Arc::new(OverpassClient::builder().build()))
///     .build();
///
/// let summary = pipeline
///     .run(
///         Path::new("data_combined_22_23.csv"),
///         Path::new("india_district.geojson"),
///         Path::new("holidays.csv"),
///         Path::new("output"),
///     )
///     .await?;
/// println!("wrote {} file(s)", summary.outputs.len());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    orchestrator: Orchestrator,
}

#[bon]
impl Pipeline {
    /// Builds a pipeline from a configuration and the three injected
    /// enrichment providers.
    #[builder]
    pub fn new(
        config: PipelineConfig,
        weather: Arc<dyn WeatherProvider>,
        land_cover: Arc<dyn LandCoverProvider>,
        amenity: Arc<dyn AmenityProvider>,
    ) -> Self {
        let orchestrator = Orchestrator::builder()
            .weather(weather)
            .land_cover(land_cover)
            .amenity(amenity)
            .concurrency(config.concurrency)
            .call_timeout(config.call_timeout)
            .max_retries(config.max_retries)
            .land_cover_class(config.land_cover_class)
            .amenity_category(config.amenity_category.clone())
            .build();
        Self {
            config,
            orchestrator,
        }
    }

    /// Runs the full pipeline: load + normalize, index, filter by region,
    /// enrich per region, derive calendar features, write one CSV per
    /// region.
    ///
    /// Per-record and per-key problems degrade to nulls/defaults and are
    /// reported in the returned [`RunSummary`]; only configuration-level
    /// problems (unreadable input, missing required columns, an empty
    /// region set) abort the run.
    pub async fn run(
        &self,
        input_csv: &Path,
        regions_geojson: &Path,
        holidays_csv: &Path,
        output_dir: &Path,
    ) -> Result<RunSummary, GeoEnrichError> {
        let input_path = input_csv.to_path_buf();
        let date_column = self.config.date_column.clone();
        let swapped = self.config.swapped_coordinates;
        let mut batch =
            task::spawn_blocking(move || frame::load_csv(&input_path, &date_column, swapped))
                .await??;
        let total_records = batch.records.len();
        info!("Loaded {total_records} record(s) from {input_csv:?}");

        let indexer = HexIndexer::new(self.config.resolution);
        indexer.assign(&mut batch.records);
        let indexed_records = batch
            .records
            .iter()
            .filter(|record| record.cell.is_some())
            .count();
        info!(
            "Indexed {indexed_records} of {total_records} record(s) at resolution {}",
            u8::from(self.config.resolution)
        );

        let regions = districts::load_regions(
            regions_geojson,
            &self.config.region_name_property,
            &self.config.districts_of_interest,
        )?;
        let calendar = HolidayCalendar::from_csv(holidays_csv)?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| GeoEnrichError::OutputWrite(output_dir.to_path_buf(), e))?;

        let mut outputs = Vec::new();
        let mut summaries = Vec::new();
        for (name, records) in districts::partition(&batch.records, &regions) {
            let enrichment = self.orchestrator.enrich_district(&records).await;
            let failed_keys = enrichment.failed_keys();
            let record_count = records.len();

            let original = batch.frame.clone();
            let calendar = calendar.clone();
            let region = name.clone();
            let dir = output_dir.to_path_buf();
            let path = task::spawn_blocking(move || {
                let mut frame = output::build_region_frame(
                    &original,
                    &region,
                    &records,
                    &enrichment,
                    &calendar,
                )?;
                output::write_region_csv(&mut frame, &dir, &region)
            })
            .await??;
            info!("Wrote {record_count} enriched record(s) for '{name}' to {path:?}");
            summaries.push(RegionSummary {
                name,
                records: record_count,
                failed_keys,
            });
            outputs.push(path);
        }

        Ok(RunSummary {
            outputs,
            total_records,
            indexed_records,
            regions: summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::error::EnrichError;
    use crate::enrich::providers::WeatherMetrics;
    use crate::spatial::index::LatLon;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use polars::prelude::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticWeather {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for StaticWeather {
        async fn daily(
            &self,
            _point: LatLon,
            _date: NaiveDate,
        ) -> Result<WeatherMetrics, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WeatherMetrics {
                precipitation_sum: Some(0.01234),
                temperature_max: Some(300.0),
                temperature_min: Some(290.0),
                wind_u_max: Some(3.0),
                wind_v_max: Some(4.0),
            })
        }
    }

    struct StaticLandCover;

    #[async_trait]
    impl LandCoverProvider for StaticLandCover {
        async fn class_area(
            &self,
            _boundary: &[LatLon],
            _window: (NaiveDate, NaiveDate),
            _class: u8,
        ) -> Result<f64, EnrichError> {
            Ok(40_000.0)
        }

        async fn total_area(
            &self,
            _boundary: &[LatLon],
            _window: (NaiveDate, NaiveDate),
        ) -> Result<f64, EnrichError> {
            Ok(100_000.0)
        }
    }

    struct FailingAmenity;

    #[async_trait]
    impl AmenityProvider for FailingAmenity {
        async fn count_in_polygon(
            &self,
            _ring: &[LatLon],
            _category: &str,
        ) -> Result<u64, EnrichError> {
            Err(EnrichError::MalformedResponse {
                url: "test".to_string(),
                message: "no payload".to_string(),
            })
        }
    }

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn delhi_geojson() -> &'static str {
        r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"NAME_2": "Delhi"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[76.0, 28.0], [78.0, 28.0], [78.0, 29.0], [76.0, 29.0], [76.0, 28.0]]]
                }
            }]
        }"#
    }

    #[tokio::test]
    async fn end_to_end_run_writes_enriched_region_output() {
        // Swapped headers: latitude arrives under `lon`. Rows 0 and 1 share
        // cell and date; row 2 has sentinel coordinates; row 3 is outside
        // every region.
        let input = write_file(
            ".csv",
            "event,lat,lon,Date\n\
             a,77.2,28.6,2023-01-06\n\
             b,77.2,28.6,2023-01-06\n\
             c,,,2023-01-06\n\
             d,4.9,52.4,2023-01-06\n",
        );
        let regions = write_file(".geojson", delhi_geojson());
        let holidays = write_file(
            ".csv",
            "Holiday,Date\nFri,06-01-2023\nSat,07-01-2023\nSun,08-01-2023\n",
        );
        let output_dir = tempfile::tempdir().unwrap();

        let weather = Arc::new(StaticWeather {
            calls: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::builder()
            .config(
                PipelineConfig::builder()
                    .districts_of_interest(vec!["Delhi".to_string()])
                    .concurrency(4)
                    .build(),
            )
            .weather(weather.clone())
            .land_cover(Arc::new(StaticLandCover))
            .amenity(Arc::new(FailingAmenity))
            .build();

        let summary = pipeline
            .run(
                input.path(),
                regions.path(),
                holidays.path(),
                output_dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.indexed_records, 3);
        assert_eq!(summary.regions.len(), 1);
        assert_eq!(summary.regions[0].name, "Delhi");
        assert_eq!(summary.regions[0].records, 2);
        // The failed amenity key is enumerated, not fatal.
        assert_eq!(summary.regions[0].failed_keys.len(), 1);

        // Two records, one shared (cell, date) key: exactly one weather call.
        assert_eq!(weather.calls.load(Ordering::SeqCst), 1);

        let expected = output_dir.path().join("final_output_Delhi.csv");
        assert_eq!(summary.outputs, vec![expected.clone()]);
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(expected))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(df.height(), 2);

        // Shared-key fan-out: both rows carry identical converted weather.
        let temps: Vec<Option<f64>> = df
            .column("temperature_2m_max")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(temps, vec![Some(26.85), Some(26.85)]);
        let precipitation: Vec<Option<f64>> = df
            .column("total_precipitation_sum")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(precipitation, vec![Some(1.23), Some(1.23)]);

        // Amenity degraded to 0 for every record of the failed cell.
        let counts: Vec<Option<i64>> = df
            .column("amenity_count")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(counts, vec![Some(0), Some(0)]);

        // Friday of an all-holiday Fri-Sat-Sun span.
        let long_weekend: Vec<Option<i64>> = df
            .column("is_long_weekend")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(long_weekend, vec![Some(1), Some(1)]);
    }

    #[tokio::test]
    async fn missing_region_match_aborts_the_run() {
        let input = write_file(".csv", "event,lat,lon,Date\na,77.2,28.6,2023-01-06\n");
        let regions = write_file(".geojson", delhi_geojson());
        let holidays = write_file(".csv", "Holiday,Date\nFri,06-01-2023\n");
        let output_dir = tempfile::tempdir().unwrap();

        let pipeline = Pipeline::builder()
            .config(
                PipelineConfig::builder()
                    .districts_of_interest(vec!["Atlantis".to_string()])
                    .build(),
            )
            .weather(Arc::new(StaticWeather {
                calls: AtomicUsize::new(0),
            }))
            .land_cover(Arc::new(StaticLandCover))
            .amenity(Arc::new(FailingAmenity))
            .build();

        let err = pipeline
            .run(
                input.path(),
                regions.path(),
                holidays.path(),
                output_dir.path(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeoEnrichError::Spatial(_)));
    }
}
