//! Coordinate normalization.
//!
//! Input files in the wild carry latitude under the `lon` header and vice
//! versa, and leave coordinates empty for records captured without a fix.
//! Normalization must run before indexing: a swapped pair produces a valid
//! but wrong cell, which nothing downstream can detect.

/// Sentinel used when a coordinate is missing from the input.
pub const DEFAULT_LAT: f64 = 0.0;
/// Sentinel used when a coordinate is missing from the input.
pub const DEFAULT_LON: f64 = 0.0;

/// Corrects a raw coordinate pair as read from the input.
///
/// When `swapped` is set the values arrived under each other's header and
/// are exchanged first. Missing values are replaced with the sentinel
/// default so every record leaves this function with both fields populated.
pub fn normalize_pair(raw_lat: Option<f64>, raw_lon: Option<f64>, swapped: bool) -> (f64, f64) {
    let (lat, lon) = if swapped {
        (raw_lon, raw_lat)
    } else {
        (raw_lat, raw_lon)
    };
    (lat.unwrap_or(DEFAULT_LAT), lon.unwrap_or(DEFAULT_LON))
}

/// True when the pair equals the sentinel default, meaning the original
/// input had no usable coordinates. Sentinel pairs are never indexed.
pub fn is_sentinel(lat: f64, lon: f64) -> bool {
    lat == DEFAULT_LAT && lon == DEFAULT_LON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_fields_when_headers_are_swapped() {
        let (lat, lon) = normalize_pair(Some(77.2), Some(28.6), true);
        assert_eq!(lat, 28.6);
        assert_eq!(lon, 77.2);
    }

    #[test]
    fn keeps_fields_when_headers_are_correct() {
        let (lat, lon) = normalize_pair(Some(28.6), Some(77.2), false);
        assert_eq!(lat, 28.6);
        assert_eq!(lon, 77.2);
    }

    #[test]
    fn missing_values_default_to_sentinel() {
        let (lat, lon) = normalize_pair(None, None, true);
        assert!(is_sentinel(lat, lon));

        // A half-missing pair is not the sentinel.
        let (lat, lon) = normalize_pair(None, Some(28.6), true);
        assert!(!is_sentinel(lat, lon));
        assert_eq!(lat, 28.6);
        assert_eq!(lon, DEFAULT_LON);
    }
}
