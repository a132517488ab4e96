mod calendar;
mod config;
mod enrich;
mod error;
mod output;
mod pipeline;
mod records;
mod spatial;

pub use error::GeoEnrichError;
pub use pipeline::{Pipeline, RegionSummary, RunSummary};

pub use config::PipelineConfig;

pub use records::error::RecordError;
pub use records::frame::{load_csv, parse_date_permissive, RecordBatch};
pub use records::normalize::{is_sentinel, normalize_pair, DEFAULT_LAT, DEFAULT_LON};
pub use records::Record;

pub use spatial::districts::{load_regions, partition, Region};
pub use spatial::error::SpatialError;
pub use spatial::index::{HexIndexer, LatLon};

pub use enrich::error::EnrichError;
pub use enrich::key::EnrichmentKey;
pub use enrich::orchestrator::{DistrictEnrichment, Orchestrator};
pub use enrich::outcome::FetchOutcome;
pub use enrich::providers::{
    AmenityProvider, EarthEngineClient, LandCoverProvider, OverpassClient, WeatherMetrics,
    WeatherProvider,
};

pub use calendar::error::CalendarError;
pub use calendar::holidays::HolidayCalendar;
pub use calendar::moon::moon_phase;

pub use h3o::Resolution;
