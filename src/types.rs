//! Canonical types for the trackfuse pipeline
//!
//! This module defines the format-agnostic model every external file format is
//! normalized into and serialized from: points, paths, parse results, merge
//! results, and the mileage ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a located fix or semantic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointKind {
    /// Raw device fix from a location-history export
    RawFix,
    /// Stationary dwell event with arrival/departure times
    PlaceVisit,
    /// Start/end marker of a classified movement segment
    ActivityMarker,
    /// Low-level position signal from a timeline-edits export
    RawSignal,
    /// Aggregated frequently-visited place
    PlaceAggregate,
    /// Point on a recorded track
    TrackPoint,
    /// Discrete point of interest
    Waypoint,
    /// Point on a planned route
    RoutePoint,
}

impl PointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::RawFix => "raw-fix",
            PointKind::PlaceVisit => "place-visit",
            PointKind::ActivityMarker => "activity-marker",
            PointKind::RawSignal => "raw-signal",
            PointKind::PlaceAggregate => "place-aggregate",
            PointKind::TrackPoint => "track-point",
            PointKind::Waypoint => "waypoint",
            PointKind::RoutePoint => "route-point",
        }
    }

    /// Whether points of this kind encode as discrete markers (waypoints,
    /// placemarks, GeoJSON Point features) rather than joining a track line.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            PointKind::Waypoint
                | PointKind::PlaceVisit
                | PointKind::ActivityMarker
                | PointKind::PlaceAggregate
        )
    }
}

/// A single located fix or semantic event in WGS84 decimal degrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Opaque unique identifier
    pub id: String,
    /// Latitude, -90..=90
    pub lat: f64,
    /// Longitude, -180..=180
    pub lng: f64,
    /// Fix time; for place visits, the arrival time
    pub timestamp: Option<DateTime<Utc>>,
    /// Departure time, present on place visits only
    pub end_timestamp: Option<DateTime<Utc>>,
    pub kind: PointKind,
    /// Horizontal accuracy (meters)
    pub accuracy: Option<f64>,
    /// Elevation (meters)
    pub altitude: Option<f64>,
    /// Speed (meters/second)
    pub velocity: Option<f64>,
    /// Heading (degrees from north)
    pub heading: Option<f64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub activity_type: Option<String>,
    pub activity_confidence: Option<f64>,
    pub place_id: Option<String>,
    /// Name of the file this point was parsed from
    pub source_file: Option<String>,
}

impl Point {
    /// Create a point with a fresh id and no metadata. The caller is expected
    /// to have validated the coordinates (see [`crate::geomath::valid_coords`]).
    pub fn new(lat: f64, lng: f64, kind: PointKind) -> Self {
        Point {
            id: Uuid::new_v4().to_string(),
            lat,
            lng,
            timestamp: None,
            end_timestamp: None,
            kind,
            accuracy: None,
            altitude: None,
            velocity: None,
            heading: None,
            name: None,
            address: None,
            activity_type: None,
            activity_confidence: None,
            place_id: None,
            source_file: None,
        }
    }

    /// Number of populated optional fields, used by dedup to keep the richer
    /// of two near-duplicate fixes.
    pub fn richness(&self) -> usize {
        [
            self.timestamp.is_some(),
            self.end_timestamp.is_some(),
            self.accuracy.is_some(),
            self.altitude.is_some(),
            self.velocity.is_some(),
            self.heading.is_some(),
            self.name.is_some(),
            self.address.is_some(),
            self.activity_type.is_some(),
            self.activity_confidence.is_some(),
            self.place_id.is_some(),
            self.source_file.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }
}

/// A latitude/longitude pair on a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Coordinate { lat, lng }
    }
}

/// An ordered movement segment; direction is travel order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPath {
    pub id: String,
    /// At least two coordinates in travel order
    pub coordinates: Vec<Coordinate>,
    pub activity_type: Option<String>,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    /// Precomputed distance when the source provides one
    pub distance_meters: Option<f64>,
    pub source_file: Option<String>,
}

impl TrackPath {
    pub fn new(coordinates: Vec<Coordinate>) -> Self {
        TrackPath {
            id: Uuid::new_v4().to_string(),
            coordinates,
            activity_type: None,
            start_timestamp: None,
            end_timestamp: None,
            distance_meters: None,
            source_file: None,
        }
    }
}

/// Counts and provenance for one decode pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseMetadata {
    /// Detected or requested source format (e.g. "raw-fixes", "gpx")
    pub format: String,
    pub point_count: usize,
    pub path_count: usize,
    /// Device inventory size, populated by the settings normalizer only
    pub device_count: Option<usize>,
    /// Human-readable source summary (e.g. FIT session metadata)
    pub description: Option<String>,
}

/// Immutable output of one decode pass over a single file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedFile {
    pub points: Vec<Point>,
    pub paths: Vec<TrackPath>,
    pub metadata: ParseMetadata,
}

impl ParsedFile {
    pub fn empty(format: &str) -> Self {
        ParsedFile {
            points: Vec::new(),
            paths: Vec::new(),
            metadata: ParseMetadata {
                format: format.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.paths.is_empty()
    }
}

/// Closed timestamp range covered by one file's points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Pairwise temporal overlap between two input files; symmetric under swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapReport {
    pub file_a: String,
    pub file_b: String,
    pub range_a: DateRange,
    pub range_b: DateRange,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
    /// Calendar days covered by the intersection, rounded up
    pub overlap_days: i64,
}

/// Bookkeeping attached to a [`MergeResult`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeMetadata {
    pub total_input_points: usize,
    pub total_output_points: usize,
    pub duplicates_removed: usize,
    pub overlaps: Vec<OverlapReport>,
}

/// Result of merging several parsed files into one deduplicated set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeResult {
    pub points: Vec<Point>,
    pub paths: Vec<TrackPath>,
    pub metadata: MergeMetadata,
}

/// Distance unit for mileage reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "miles",
        }
    }

    /// Convert meters into this unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => meters / 1000.0,
            DistanceUnit::Miles => meters / 1609.344,
        }
    }
}

/// One driving trip in a mileage ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub activity_type: String,
    pub distance_meters: f64,
    /// Distance converted to the requested unit
    pub distance: f64,
    /// Human-readable duration ("2d 5h", "3h 20m", "45m")
    pub duration: Option<String>,
}

/// Per-day rollup of a mileage ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMileage {
    pub date: String,
    pub trip_count: usize,
    pub distance: f64,
}

/// Per-month rollup of a mileage ledger (key YYYY-MM)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyMileage {
    pub month: String,
    pub trip_count: usize,
    pub distance: f64,
}

/// Mileage ledger over driving-class activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MileageLog {
    pub trips: Vec<Trip>,
    /// Total distance in the requested unit
    pub total_distance: f64,
    pub unit: DistanceUnit,
    pub daily_summary: Vec<DailyMileage>,
    pub monthly_summary: Vec<MonthlyMileage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_richness_counts_populated_fields() {
        let mut p = Point::new(52.0, 13.0, PointKind::RawFix);
        assert_eq!(p.richness(), 0);

        p.accuracy = Some(12.0);
        p.name = Some("home".to_string());
        assert_eq!(p.richness(), 2);
    }

    #[test]
    fn test_marker_classification() {
        assert!(PointKind::Waypoint.is_marker());
        assert!(PointKind::PlaceVisit.is_marker());
        assert!(!PointKind::TrackPoint.is_marker());
        assert!(!PointKind::RawFix.is_marker());
    }

    #[test]
    fn test_unit_conversion() {
        assert!((DistanceUnit::Kilometers.from_meters(10_000.0) - 10.0).abs() < 1e-9);
        assert!((DistanceUnit::Miles.from_meters(10_000.0) - 6.2137).abs() < 0.001);
    }
}
