//! Administrative-region loading and the spatial containment filter.
//!
//! Regions arrive as a GeoJSON FeatureCollection of named polygons in WGS84,
//! the same CRS the records use. Reconciling coordinate systems is a
//! precondition of this module, not something it does per call.

use crate::records::Record;
use crate::spatial::error::SpatialError;
use geo::{Intersects, MultiPolygon, Point};
use geojson::GeoJson;
use log::{info, warn};
use std::path::Path;

/// A named administrative boundary polygon, loaded once per run.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub polygon: MultiPolygon<f64>,
}

/// Loads the regions of interest from a GeoJSON file.
///
/// Features are named by `name_property` (e.g. `NAME_2`) and restricted to
/// `districts_of_interest`. Features without the name property or with
/// non-areal geometry are skipped with a diagnostic. An empty result for a
/// non-empty requested set is a configuration error: the whole run would
/// silently produce nothing.
pub fn load_regions(
    path: &Path,
    name_property: &str,
    districts_of_interest: &[String],
) -> Result<Vec<Region>, SpatialError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SpatialError::RegionRead(path.to_path_buf(), e))?;
    let geojson: GeoJson = raw
        .parse()
        .map_err(|e| SpatialError::RegionParse(path.to_path_buf(), Box::new(e)))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(SpatialError::NotAFeatureCollection(path.to_path_buf()));
    };

    let mut regions = Vec::new();
    for feature in collection.features {
        let Some(name) = feature
            .properties
            .as_ref()
            .and_then(|properties| properties.get(name_property))
            .and_then(|value| value.as_str())
            .map(str::to_string)
        else {
            warn!("Skipping region feature without a '{name_property}' property");
            continue;
        };
        if !districts_of_interest.is_empty() && !districts_of_interest.contains(&name) {
            continue;
        }
        let Some(geometry) = feature.geometry else {
            warn!("Skipping region '{name}' without geometry");
            continue;
        };
        let converted = geo::Geometry::<f64>::try_from(geometry).map_err(|e| {
            SpatialError::GeometryConversion {
                name: name.clone(),
                source: Box::new(e),
            }
        })?;
        let polygon = match converted {
            geo::Geometry::Polygon(polygon) => MultiPolygon(vec![polygon]),
            geo::Geometry::MultiPolygon(multi) => multi,
            _ => {
                warn!("Skipping region '{name}' with non-areal geometry");
                continue;
            }
        };
        regions.push(Region { name, polygon });
    }

    if regions.is_empty() && !districts_of_interest.is_empty() {
        return Err(SpatialError::NoMatchingRegions {
            requested: districts_of_interest.to_vec(),
        });
    }
    info!("Loaded {} region(s) from {:?}", regions.len(), path);
    Ok(regions)
}

/// Partitions indexed records by region via a boundary-inclusive
/// point-in-polygon test.
///
/// Records without a cell (sentinel coordinates) and records inside no
/// configured region are dropped. A record exactly on a shared boundary is
/// emitted once per matching region; duplication across partitions is the
/// documented tie-break, not an error. Empty partitions are omitted.
pub fn partition(records: &[Record], regions: &[Region]) -> Vec<(String, Vec<Record>)> {
    let mut partitions = Vec::with_capacity(regions.len());
    for region in regions {
        let members: Vec<Record> = records
            .iter()
            .filter(|record| record.cell.is_some())
            .filter(|record| {
                region
                    .polygon
                    .intersects(&Point::new(record.lon, record.lat))
            })
            .cloned()
            .collect();
        info!(
            "Region '{}' matched {} of {} records",
            region.name,
            members.len(),
            records.len()
        );
        if !members.is_empty() {
            partitions.push((region.name.clone(), members));
        }
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use h3o::{LatLng, Resolution};
    use std::io::Write;

    fn record(row_id: i64, lat: f64, lon: f64) -> Record {
        let cell = if lat == 0.0 && lon == 0.0 {
            None
        } else {
            Some(LatLng::new(lat, lon).unwrap().to_cell(Resolution::Four))
        };
        Record {
            row_id,
            lat,
            lon,
            event_date: None,
            cell,
        }
    }

    fn square(name: &str, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Region {
        Region {
            name: name.to_string(),
            polygon: MultiPolygon(vec![polygon![
                (x: min_lon, y: min_lat),
                (x: max_lon, y: min_lat),
                (x: max_lon, y: max_lat),
                (x: min_lon, y: max_lat),
                (x: min_lon, y: min_lat),
            ]]),
        }
    }

    #[test]
    fn partitions_by_containment_and_drops_outsiders() {
        let regions = vec![square("Delhi", 76.0, 78.0, 28.0, 29.0)];
        let records = vec![
            record(0, 28.6, 77.2),  // inside
            record(1, 19.0, 72.8),  // outside
            record(2, 0.0, 0.0),    // sentinel, never partitioned
        ];
        let partitions = partition(&records, &regions);
        assert_eq!(partitions.len(), 1);
        let (name, members) = &partitions[0];
        assert_eq!(name, "Delhi");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].row_id, 0);
    }

    #[test]
    fn shared_boundary_point_lands_in_both_regions() {
        let regions = vec![
            square("West", 76.0, 77.0, 28.0, 29.0),
            square("East", 77.0, 78.0, 28.0, 29.0),
        ];
        // Exactly on the shared meridian.
        let records = vec![record(0, 28.5, 77.0)];
        let partitions = partition(&records, &regions);
        assert_eq!(partitions.len(), 2);
        assert!(partitions.iter().all(|(_, members)| members.len() == 1));
    }

    #[test]
    fn loads_named_regions_and_filters_to_interest_set() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME_2": "Delhi"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[76.0, 28.0], [78.0, 28.0], [78.0, 29.0], [76.0, 29.0], [76.0, 28.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"NAME_2": "Pune"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[73.0, 18.0], [74.0, 18.0], [74.0, 19.0], [73.0, 19.0], [73.0, 18.0]]]
                    }
                }
            ]
        }"#;
        let mut file = tempfile::Builder::new()
            .suffix(".geojson")
            .tempfile()
            .unwrap();
        file.write_all(geojson.as_bytes()).unwrap();
        file.flush().unwrap();

        let regions =
            load_regions(file.path(), "NAME_2", &["Delhi".to_string()]).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, "Delhi");

        let err = load_regions(file.path(), "NAME_2", &["Ahmadabad".to_string()]).unwrap_err();
        assert!(matches!(err, SpatialError::NoMatchingRegions { .. }));
    }
}
