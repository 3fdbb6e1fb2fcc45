//! Coordinate math and small parsing helpers
//!
//! Haversine distance, coordinate validation, E7 integer decoding, `geo:` URI
//! parsing, and human-readable duration formatting. These are shared by the
//! normalizers, the deduplicator, and the stats engine.

use chrono::{DateTime, Utc};

/// Earth mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 points, in meters
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Whether a latitude/longitude pair is finite and within WGS84 bounds
pub fn valid_coords(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Decode an E7-scaled integer coordinate (value * 1e7) to decimal degrees
pub fn decode_e7(value: i64) -> f64 {
    value as f64 / 10_000_000.0
}

/// Parse a `geo:<lat>,<lng>` string; the `geo:` prefix is optional.
/// Returns `None` when the parts do not parse or fall outside WGS84 bounds.
pub fn parse_geo_uri(value: &str) -> Option<(f64, f64)> {
    let stripped = value.trim().strip_prefix("geo:").unwrap_or(value.trim());
    let (lat_str, lng_str) = stripped.split_once(',')?;
    let lat: f64 = lat_str.trim().parse().ok()?;
    let lng: f64 = lng_str.trim().parse().ok()?;
    if valid_coords(lat, lng) {
        Some((lat, lng))
    } else {
        None
    }
}

/// Format the span between two timestamps as the largest applicable unit
/// combination: days+hours, hours+minutes, or minutes. Display only, never
/// used for numeric calculation.
pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total_minutes = (end - start).num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Berlin -> Hamburg, roughly 255 km
        let d = haversine_distance(52.52, 13.405, 53.5511, 9.9937);
        assert!((d - 255_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_distance(48.0, 11.0, 48.0, 11.0), 0.0);
    }

    #[test]
    fn test_valid_coords() {
        assert!(valid_coords(52.5, 13.4));
        assert!(valid_coords(-90.0, 180.0));
        assert!(!valid_coords(90.1, 0.0));
        assert!(!valid_coords(0.0, -180.5));
        assert!(!valid_coords(f64::NAN, 0.0));
        assert!(!valid_coords(0.0, f64::INFINITY));
    }

    #[test]
    fn test_decode_e7_exact() {
        assert_eq!(decode_e7(528_765_432), 52.8765432);
        assert_eq!(decode_e7(-1_234_567), -0.1234567);
        assert_eq!(decode_e7(0), 0.0);
    }

    #[test]
    fn test_parse_geo_uri() {
        assert_eq!(parse_geo_uri("geo:52.5,13.4"), Some((52.5, 13.4)));
        assert_eq!(parse_geo_uri("52.5, 13.4"), Some((52.5, 13.4)));
        assert_eq!(parse_geo_uri("geo:91.0,0.0"), None);
        assert_eq!(parse_geo_uri("geo:not,numbers"), None);
        assert_eq!(parse_geo_uri(""), None);
    }

    #[test]
    fn test_format_duration_units() {
        let start = "2024-01-15T08:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let end = start + chrono::Duration::minutes(45);
        assert_eq!(format_duration(start, end), "45m");

        let end = start + chrono::Duration::minutes(3 * 60 + 20);
        assert_eq!(format_duration(start, end), "3h 20m");

        let end = start + chrono::Duration::hours(2 * 24 + 5);
        assert_eq!(format_duration(start, end), "2d 5h");
    }
}
