//! Run-level configuration.

use bon::Builder;
use h3o::Resolution;
use std::time::Duration;

/// Configuration for one pipeline run.
///
/// The resolution is fixed for the whole run; changing it changes the
/// granularity of every enrichment key and invalidates any collected
/// results. The concurrency bound doubles as the backpressure mechanism
/// towards the rate-limited enrichment services.
///
/// # Examples
///
/// ```
/// use geoenrich::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .districts_of_interest(vec!["Ahmadabad".to_string(), "Delhi".to_string()])
///     .build();
/// assert_eq!(config.concurrency, 32);
/// assert!(config.swapped_coordinates);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    /// Hexagonal cell resolution applied to every record.
    #[builder(default = Resolution::Four)]
    pub resolution: Resolution,

    /// Administrative regions to keep; records elsewhere are dropped.
    pub districts_of_interest: Vec<String>,

    /// GeoJSON property carrying the region name.
    #[builder(into, default = "NAME_2".to_string())]
    pub region_name_property: String,

    /// Input column carrying the event date.
    #[builder(into, default = "Date".to_string())]
    pub date_column: String,

    /// Whether the input carries latitude under the `lon` header and vice
    /// versa, the layout observed in the source extracts.
    #[builder(default = true)]
    pub swapped_coordinates: bool,

    /// In-flight request bound per enrichment kind.
    #[builder(default = 32)]
    pub concurrency: usize,

    /// Per-call deadline for external requests.
    #[builder(default = Duration::from_secs(30))]
    pub call_timeout: Duration,

    /// Additional attempts for transient failures only.
    #[builder(default = 1)]
    pub max_retries: u32,

    /// Categorical class forming the land-cover percentage numerator.
    #[builder(default = 6)]
    pub land_cover_class: u8,

    /// Amenity tag counted inside each cell.
    #[builder(into, default = "restaurant".to_string())]
    pub amenity_category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let config = PipelineConfig::builder()
            .districts_of_interest(vec!["Delhi".to_string()])
            .build();
        assert_eq!(config.resolution, Resolution::Four);
        assert_eq!(config.region_name_property, "NAME_2");
        assert_eq!(config.date_column, "Date");
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.land_cover_class, 6);
        assert_eq!(config.amenity_category, "restaurant");
    }
}
