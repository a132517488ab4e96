use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("Failed to read region file '{0}'")]
    RegionRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse region file '{0}' as GeoJSON")]
    RegionParse(PathBuf, #[source] Box<geojson::Error>),

    #[error("Region file '{0}' is not a GeoJSON FeatureCollection")]
    NotAFeatureCollection(PathBuf),

    #[error("Failed to convert geometry for region '{name}'")]
    GeometryConversion {
        name: String,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("No configured district matched the region file; requested {requested:?}")]
    NoMatchingRegions { requested: Vec<String> },
}
