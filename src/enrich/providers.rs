//! Enrichment service contracts and their HTTP implementations.
//!
//! The external services are reached through narrow request/response
//! contracts only: a reduce-region JSON endpoint for the raster-backed
//! signals (weather, land cover) and the Overpass `out count` query for
//! amenity counts. Everything beyond these contracts lives server-side.

use crate::enrich::error::EnrichError;
use crate::spatial::index::LatLon;
use async_trait::async_trait;
use bon::bon;
use chrono::{Duration, NaiveDate};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ERA5-Land daily aggregates, the weather source dataset.
pub const WEATHER_DATASET: &str = "ECMWF/ERA5_LAND/DAILY_AGGR";
/// Dynamic World, the land-classification raster dataset.
pub const LAND_COVER_DATASET: &str = "GOOGLE/DYNAMICWORLD/V1";

const PRECIPITATION_BAND: &str = "total_precipitation_sum";
const TEMPERATURE_MAX_BAND: &str = "temperature_2m_max";
const TEMPERATURE_MIN_BAND: &str = "temperature_2m_min";
const WIND_U_BAND: &str = "u_component_of_wind_10m_max";
const WIND_V_BAND: &str = "v_component_of_wind_10m_max";

const WEATHER_BANDS: [&str; 5] = [
    PRECIPITATION_BAND,
    TEMPERATURE_MAX_BAND,
    TEMPERATURE_MIN_BAND,
    WIND_U_BAND,
    WIND_V_BAND,
];

/// Raw per-day weather metrics as returned by the source: precipitation in
/// meters, temperatures in Kelvin, wind components in m/s. Unit conversion
/// happens in the output pass, not here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherMetrics {
    pub precipitation_sum: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub wind_u_max: Option<f64>,
    pub wind_v_max: Option<f64>,
}

impl WeatherMetrics {
    /// Euclidean norm of the two orthogonal wind components; a missing
    /// component contributes zero, matching the source's reported maxima.
    pub fn wind_speed(&self) -> f64 {
        let u = self.wind_u_max.unwrap_or(0.0);
        let v = self.wind_v_max.unwrap_or(0.0);
        u.hypot(v)
    }
}

/// Daily weather metrics for the 24-hour window starting at `date`, reduced
/// around a point at kilometers scale.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn daily(&self, point: LatLon, date: NaiveDate) -> Result<WeatherMetrics, EnrichError>;
}

/// Summed-area queries over a polygon at tens-of-meters scale, used to
/// derive the land-cover percentage: one masked to a categorical class,
/// one unmasked for the total.
#[async_trait]
pub trait LandCoverProvider: Send + Sync {
    async fn class_area(
        &self,
        boundary: &[LatLon],
        window: (NaiveDate, NaiveDate),
        class: u8,
    ) -> Result<f64, EnrichError>;

    async fn total_area(
        &self,
        boundary: &[LatLon],
        window: (NaiveDate, NaiveDate),
    ) -> Result<f64, EnrichError>;
}

/// Count of point-of-interest features of one amenity category inside a
/// closed polygon ring.
#[async_trait]
pub trait AmenityProvider: Send + Sync {
    async fn count_in_polygon(&self, ring: &[LatLon], category: &str)
        -> Result<u64, EnrichError>;
}

#[derive(Serialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeometryPayload {
    /// `[lon, lat]`, GeoJSON axis order.
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
}

fn point_payload(point: LatLon) -> GeometryPayload {
    GeometryPayload::Point([point.1, point.0])
}

fn polygon_payload(ring: &[LatLon]) -> GeometryPayload {
    GeometryPayload::Polygon(vec![ring.iter().map(|vertex| [vertex.1, vertex.0]).collect()])
}

#[derive(Serialize)]
struct ReduceRegionRequest<'a> {
    dataset: &'a str,
    bands: Vec<&'a str>,
    reducer: &'a str,
    geometry: GeometryPayload,
    start_date: String,
    end_date: String,
    scale: f64,
    /// Restricts the band to one categorical value before area reduction.
    #[serde(skip_serializing_if = "Option::is_none")]
    class_value: Option<u8>,
}

#[derive(Deserialize)]
struct ReduceRegionResponse {
    #[serde(default)]
    values: HashMap<String, f64>,
}

/// Client for the Earth-Engine-style reduce-region service, covering both
/// the weather and the land-cover contracts.
///
/// One instance is constructed per run and injected into the pipeline; it
/// holds the HTTP connection pool for every request it issues.
pub struct EarthEngineClient {
    http: Client,
    base_url: String,
    weather_scale_m: f64,
    land_cover_scale_m: f64,
}

#[bon]
impl EarthEngineClient {
    /// Builds a client for the given service endpoint.
    ///
    /// * `.base_url(..)`: **Required.** Service root, without trailing slash.
    /// * `.weather_scale_m(..)`: reduction scale for weather queries.
    ///   Defaults to 10 km, appropriate to the weather grid resolution.
    /// * `.land_cover_scale_m(..)`: reduction scale for land-cover queries.
    ///   Defaults to 30 m, the classification raster's native resolution.
    #[builder]
    pub fn new(
        #[builder(into)] base_url: String,
        weather_scale_m: Option<f64>,
        land_cover_scale_m: Option<f64>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url,
            weather_scale_m: weather_scale_m.unwrap_or(10_000.0),
            land_cover_scale_m: land_cover_scale_m.unwrap_or(30.0),
        }
    }

    async fn reduce_region(
        &self,
        request: &ReduceRegionRequest<'_>,
    ) -> Result<ReduceRegionResponse, EnrichError> {
        let url = format!("{}/v1/reduce", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| EnrichError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {url}: {e:?}");
                return Err(if let Some(status) = e.status() {
                    EnrichError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    EnrichError::NetworkRequest(url, e)
                });
            }
        };
        response
            .json::<ReduceRegionResponse>()
            .await
            .map_err(|e| EnrichError::MalformedResponse {
                url,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl WeatherProvider for EarthEngineClient {
    async fn daily(&self, point: LatLon, date: NaiveDate) -> Result<WeatherMetrics, EnrichError> {
        let request = ReduceRegionRequest {
            dataset: WEATHER_DATASET,
            bands: WEATHER_BANDS.to_vec(),
            reducer: "mean",
            geometry: point_payload(point),
            start_date: date.format("%Y-%m-%d").to_string(),
            end_date: (date + Duration::days(1)).format("%Y-%m-%d").to_string(),
            scale: self.weather_scale_m,
            class_value: None,
        };
        let response = self.reduce_region(&request).await?;
        let band = |name: &str| response.values.get(name).copied();
        Ok(WeatherMetrics {
            precipitation_sum: band(PRECIPITATION_BAND),
            temperature_max: band(TEMPERATURE_MAX_BAND),
            temperature_min: band(TEMPERATURE_MIN_BAND),
            wind_u_max: band(WIND_U_BAND),
            wind_v_max: band(WIND_V_BAND),
        })
    }
}

#[async_trait]
impl LandCoverProvider for EarthEngineClient {
    async fn class_area(
        &self,
        boundary: &[LatLon],
        window: (NaiveDate, NaiveDate),
        class: u8,
    ) -> Result<f64, EnrichError> {
        let request = ReduceRegionRequest {
            dataset: LAND_COVER_DATASET,
            bands: vec!["label"],
            reducer: "sum_area",
            geometry: polygon_payload(boundary),
            start_date: window.0.format("%Y-%m-%d").to_string(),
            end_date: window.1.format("%Y-%m-%d").to_string(),
            scale: self.land_cover_scale_m,
            class_value: Some(class),
        };
        let response = self.reduce_region(&request).await?;
        // Absent band means the masked area summed to nothing.
        Ok(response.values.get("label").copied().unwrap_or(0.0))
    }

    async fn total_area(
        &self,
        boundary: &[LatLon],
        window: (NaiveDate, NaiveDate),
    ) -> Result<f64, EnrichError> {
        let request = ReduceRegionRequest {
            dataset: LAND_COVER_DATASET,
            bands: vec!["area"],
            reducer: "sum_area",
            geometry: polygon_payload(boundary),
            start_date: window.0.format("%Y-%m-%d").to_string(),
            end_date: window.1.format("%Y-%m-%d").to_string(),
            scale: self.land_cover_scale_m,
            class_value: None,
        };
        let response = self.reduce_region(&request).await?;
        Ok(response.values.get("area").copied().unwrap_or(0.0))
    }
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(default)]
    tags: Option<OverpassTags>,
}

#[derive(Deserialize)]
struct OverpassTags {
    total: Option<String>,
}

/// Client for the Overpass amenity-count contract.
pub struct OverpassClient {
    http: Client,
    base_url: String,
}

#[bon]
impl OverpassClient {
    /// Builds a client. `.base_url(..)` defaults to the public Overpass
    /// interpreter endpoint.
    #[builder]
    pub fn new(#[builder(into)] base_url: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url
                .unwrap_or_else(|| "https://overpass-api.de/api/interpreter".to_string()),
        }
    }

    fn build_query(ring: &[LatLon], category: &str) -> String {
        let coordinates = ring
            .iter()
            .map(|vertex| format!("{} {}", vertex.0, vertex.1))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "[out:json];(node[\"amenity\"=\"{category}\"](poly:\"{coordinates}\"););out count;"
        )
    }
}

#[async_trait]
impl AmenityProvider for OverpassClient {
    async fn count_in_polygon(
        &self,
        ring: &[LatLon],
        category: &str,
    ) -> Result<u64, EnrichError> {
        let query = Self::build_query(ring, category);
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| EnrichError::NetworkRequest(self.base_url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {e:?}", self.base_url);
                return Err(if let Some(status) = e.status() {
                    EnrichError::HttpStatus {
                        url: self.base_url.clone(),
                        status,
                        source: e,
                    }
                } else {
                    EnrichError::NetworkRequest(self.base_url.clone(), e)
                });
            }
        };
        let payload =
            response
                .json::<OverpassResponse>()
                .await
                .map_err(|e| EnrichError::MalformedResponse {
                    url: self.base_url.clone(),
                    message: e.to_string(),
                })?;
        // A well-formed response without a count element is an empty result,
        // not a failure: the count is zero and no retry applies.
        let count = payload
            .elements
            .first()
            .and_then(|element| element.tags.as_ref())
            .and_then(|tags| tags.total.as_deref())
            .and_then(|total| total.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_speed_is_euclidean_norm_of_components() {
        let metrics = WeatherMetrics {
            wind_u_max: Some(3.0),
            wind_v_max: Some(4.0),
            ..Default::default()
        };
        assert!((metrics.wind_speed() - 5.0).abs() < 1e-12);

        // Missing components contribute zero.
        let partial = WeatherMetrics {
            wind_u_max: Some(3.0),
            ..Default::default()
        };
        assert!((partial.wind_speed() - 3.0).abs() < 1e-12);
        assert_eq!(WeatherMetrics::default().wind_speed(), 0.0);
    }

    #[test]
    fn overpass_query_serializes_ring_as_lat_lon_pairs() {
        let ring = [
            LatLon(28.0, 77.0),
            LatLon(28.1, 77.1),
            LatLon(28.2, 77.0),
            LatLon(28.0, 77.0),
        ];
        let query = OverpassClient::build_query(&ring, "restaurant");
        assert!(query.contains("[out:json]"));
        assert!(query.contains("node[\"amenity\"=\"restaurant\"]"));
        assert!(query.contains("poly:\"28 77 28.1 77.1 28.2 77 28 77\""));
        assert!(query.ends_with("out count;"));
    }

    #[test]
    fn overpass_count_parses_from_tags_and_defaults_to_zero() {
        let payload: OverpassResponse = serde_json::from_str(
            r#"{"elements":[{"type":"count","tags":{"total":"42"}}]}"#,
        )
        .unwrap();
        let total = payload
            .elements
            .first()
            .and_then(|element| element.tags.as_ref())
            .and_then(|tags| tags.total.as_deref())
            .and_then(|total| total.parse::<u64>().ok())
            .unwrap_or(0);
        assert_eq!(total, 42);

        let empty: OverpassResponse = serde_json::from_str(r#"{"elements":[]}"#).unwrap();
        assert!(empty.elements.is_empty());
    }

    #[test]
    fn geometry_payload_uses_geojson_axis_order() {
        let point = serde_json::to_value(point_payload(LatLon(28.6, 77.2))).unwrap();
        assert_eq!(point["type"], "Point");
        assert_eq!(point["coordinates"][0], 77.2);
        assert_eq!(point["coordinates"][1], 28.6);
    }
}
