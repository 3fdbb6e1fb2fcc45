//! Semantic-visits normalizer
//!
//! Handles the `{timelineObjects: [...]}` export: placeVisit entries become
//! place-visit points, activitySegment entries become start/end markers plus a
//! path. When a segment carries no usable route, a 2-point straight line
//! between its endpoints stands in so every segment yields a polyline.

use super::{parse_timestamp, pick_top_activity, sort_points_by_time, SchemaNormalizer};
use crate::detector::TimelineFormat;
use crate::geomath::{decode_e7, valid_coords};
use crate::types::{Coordinate, ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the timelineObjects schema
pub struct SemanticVisitsNormalizer;

impl SchemaNormalizer for SemanticVisitsNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::SemanticVisits
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let payload: SemanticVisitsFile = match serde_json::from_value(document.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{source_name}: semantic-visits payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        let mut points = Vec::new();
        let mut paths = Vec::new();

        for object in &payload.timeline_objects {
            if let Some(visit) = &object.place_visit {
                if let Some(point) = visit_point(visit, source_name) {
                    points.push(point);
                }
            }
            if let Some(segment) = &object.activity_segment {
                normalize_segment(segment, source_name, &mut points, &mut paths);
            }
        }

        sort_points_by_time(&mut points);

        ParsedFile {
            metadata: ParseMetadata {
                format: self.format().as_str().to_string(),
                point_count: points.len(),
                path_count: paths.len(),
                ..Default::default()
            },
            points,
            paths,
        }
    }
}

fn visit_point(visit: &PlaceVisit, source_name: &str) -> Option<Point> {
    let location = visit.location.as_ref()?;
    let (lat, lng) = e7_pair(location.latitude_e7, location.longitude_e7)?;

    let mut point = Point::new(lat, lng, PointKind::PlaceVisit);
    point.name = location.name.clone();
    point.address = location.address.clone();
    point.place_id = location.place_id.clone();
    point.source_file = Some(source_name.to_string());
    if let Some(duration) = &visit.duration {
        point.timestamp = duration.start_timestamp.as_deref().and_then(parse_timestamp);
        point.end_timestamp = duration.end_timestamp.as_deref().and_then(parse_timestamp);
    }
    Some(point)
}

fn normalize_segment(
    segment: &ActivitySegment,
    source_name: &str,
    points: &mut Vec<Point>,
    paths: &mut Vec<TrackPath>,
) {
    let activity = pick_top_activity(
        segment
            .activities
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| (c.activity_type.clone(), c.probability)),
    )
    .or_else(|| segment.activity_type.clone().map(|t| (t, None)));

    let start = segment
        .start_location
        .as_ref()
        .and_then(|l| e7_pair(l.latitude_e7, l.longitude_e7));
    let end = segment
        .end_location
        .as_ref()
        .and_then(|l| e7_pair(l.latitude_e7, l.longitude_e7));

    let start_ts = segment
        .duration
        .as_ref()
        .and_then(|d| d.start_timestamp.as_deref())
        .and_then(parse_timestamp);
    let end_ts = segment
        .duration
        .as_ref()
        .and_then(|d| d.end_timestamp.as_deref())
        .and_then(parse_timestamp);

    for (coords, timestamp) in [(start, start_ts), (end, end_ts)] {
        if let Some((lat, lng)) = coords {
            let mut marker = Point::new(lat, lng, PointKind::ActivityMarker);
            marker.timestamp = timestamp;
            marker.source_file = Some(source_name.to_string());
            if let Some((kind, confidence)) = &activity {
                marker.activity_type = Some(kind.clone());
                marker.activity_confidence = *confidence;
            }
            points.push(marker);
        }
    }

    // Detailed route when available, otherwise the straight-line fallback
    let mut coordinates: Vec<Coordinate> = segment
        .simplified_raw_path
        .as_ref()
        .map(|path| {
            path.points
                .iter()
                .filter_map(|p| e7_pair(p.lat_e7, p.lng_e7))
                .map(|(lat, lng)| Coordinate::new(lat, lng))
                .collect()
        })
        .unwrap_or_default();

    if coordinates.len() < 2 {
        coordinates = match (start, end) {
            (Some((lat1, lng1)), Some((lat2, lng2))) => {
                vec![Coordinate::new(lat1, lng1), Coordinate::new(lat2, lng2)]
            }
            _ => return,
        };
    }

    let mut path = TrackPath::new(coordinates);
    path.activity_type = activity.map(|(kind, _)| kind);
    path.start_timestamp = start_ts;
    path.end_timestamp = end_ts;
    path.distance_meters = segment.distance;
    path.source_file = Some(source_name.to_string());
    paths.push(path);
}

fn e7_pair(lat_e7: Option<i64>, lng_e7: Option<i64>) -> Option<(f64, f64)> {
    let lat = decode_e7(lat_e7?);
    let lng = decode_e7(lng_e7?);
    valid_coords(lat, lng).then_some((lat, lng))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticVisitsFile {
    timeline_objects: Vec<TimelineObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineObject {
    place_visit: Option<PlaceVisit>,
    activity_segment: Option<ActivitySegment>,
}

#[derive(Debug, Deserialize)]
struct PlaceVisit {
    location: Option<VisitLocation>,
    duration: Option<DurationWindow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitLocation {
    latitude_e7: Option<i64>,
    longitude_e7: Option<i64>,
    address: Option<String>,
    name: Option<String>,
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DurationWindow {
    start_timestamp: Option<String>,
    end_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySegment {
    start_location: Option<SegmentLocation>,
    end_location: Option<SegmentLocation>,
    simplified_raw_path: Option<RawPath>,
    activity_type: Option<String>,
    activities: Option<Vec<SegmentActivity>>,
    distance: Option<f64>,
    duration: Option<DurationWindow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentLocation {
    latitude_e7: Option<i64>,
    longitude_e7: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawPath {
    points: Vec<RawPathPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPathPoint {
    lat_e7: Option<i64>,
    lng_e7: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentActivity {
    activity_type: String,
    probability: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> Value {
        json!({
            "timelineObjects": [
                {
                    "placeVisit": {
                        "location": {
                            "latitudeE7": 525200000,
                            "longitudeE7": 134050000,
                            "name": "Cafe Kranzler",
                            "address": "Kurfürstendamm 18, Berlin",
                            "placeId": "ChIJ123"
                        },
                        "duration": {
                            "startTimestamp": "2024-01-15T09:00:00Z",
                            "endTimestamp": "2024-01-15T10:30:00Z"
                        }
                    }
                },
                {
                    "activitySegment": {
                        "startLocation": {"latitudeE7": 525200000, "longitudeE7": 134050000},
                        "endLocation": {"latitudeE7": 525300000, "longitudeE7": 134150000},
                        "activityType": "IN_PASSENGER_VEHICLE",
                        "activities": [
                            {"activityType": "IN_PASSENGER_VEHICLE", "probability": 92.3},
                            {"activityType": "WALKING", "probability": 4.1}
                        ],
                        "distance": 1850.0,
                        "duration": {
                            "startTimestamp": "2024-01-15T10:30:00Z",
                            "endTimestamp": "2024-01-15T10:45:00Z"
                        },
                        "simplifiedRawPath": {
                            "points": [
                                {"latE7": 525200000, "lngE7": 134050000},
                                {"latE7": 525250000, "lngE7": 134100000},
                                {"latE7": 525300000, "lngE7": 134150000}
                            ]
                        }
                    }
                }
            ]
        })
    }

    #[test]
    fn test_normalize_visits_and_segments() {
        let parsed = SemanticVisitsNormalizer.normalize(&sample_doc(), "semantic.json");

        // One visit + two activity markers
        assert_eq!(parsed.points.len(), 3);
        assert_eq!(parsed.paths.len(), 1);

        let visit = &parsed.points[0];
        assert_eq!(visit.kind, PointKind::PlaceVisit);
        assert_eq!(visit.name.as_deref(), Some("Cafe Kranzler"));
        assert_eq!(visit.place_id.as_deref(), Some("ChIJ123"));
        assert!(visit.timestamp.is_some());
        assert!(visit.end_timestamp.is_some());

        let marker = &parsed.points[1];
        assert_eq!(marker.kind, PointKind::ActivityMarker);
        assert_eq!(marker.activity_type.as_deref(), Some("IN_PASSENGER_VEHICLE"));
        assert_eq!(marker.activity_confidence, Some(92.3));

        let path = &parsed.paths[0];
        assert_eq!(path.coordinates.len(), 3);
        assert_eq!(path.distance_meters, Some(1850.0));
        assert_eq!(path.activity_type.as_deref(), Some("IN_PASSENGER_VEHICLE"));
    }

    #[test]
    fn test_straight_line_fallback() {
        let doc = json!({
            "timelineObjects": [{
                "activitySegment": {
                    "startLocation": {"latitudeE7": 525200000, "longitudeE7": 134050000},
                    "endLocation": {"latitudeE7": 525300000, "longitudeE7": 134150000},
                    "activityType": "WALKING"
                }
            }]
        });

        let parsed = SemanticVisitsNormalizer.normalize(&doc, "semantic.json");
        assert_eq!(parsed.paths.len(), 1);
        let path = &parsed.paths[0];
        assert_eq!(path.coordinates.len(), 2);
        assert_eq!(path.coordinates[0], Coordinate::new(52.52, 13.405));
        assert_eq!(path.coordinates[1], Coordinate::new(52.53, 13.415));
    }

    #[test]
    fn test_segment_without_endpoints_yields_no_path() {
        let doc = json!({
            "timelineObjects": [{
                "activitySegment": {"activityType": "WALKING"}
            }]
        });
        let parsed = SemanticVisitsNormalizer.normalize(&doc, "semantic.json");
        assert!(parsed.paths.is_empty());
        assert!(parsed.points.is_empty());
    }
}
