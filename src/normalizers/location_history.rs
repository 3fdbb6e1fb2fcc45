//! Location-history array normalizer
//!
//! The newest export drops the wrapper object: the document root is an array
//! of entries, each a visit, an activity, or a timeline path, with `geo:`
//! string coordinates and `topCandidate` classification records.

use super::{parse_timestamp, sort_points_by_time, SchemaNormalizer};
use crate::detector::TimelineFormat;
use crate::geomath::parse_geo_uri;
use crate::types::{Coordinate, ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the top-level-array schema
pub struct LocationHistoryNormalizer;

impl SchemaNormalizer for LocationHistoryNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::LocationHistory
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let entries: Vec<HistoryEntry> = match serde_json::from_value(document.clone()) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("{source_name}: location-history payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        let mut points = Vec::new();
        let mut paths = Vec::new();

        for entry in &entries {
            let start_ts = entry.start_time.as_deref().and_then(parse_timestamp);
            let end_ts = entry.end_time.as_deref().and_then(parse_timestamp);

            if let Some(visit) = &entry.visit {
                if let Some(point) = visit_point(visit, start_ts, end_ts, source_name) {
                    points.push(point);
                }
            }

            if let Some(activity) = &entry.activity {
                normalize_activity(activity, start_ts, end_ts, source_name, &mut points, &mut paths);
            }

            if let Some(timeline_path) = &entry.timeline_path {
                normalize_timeline_path(timeline_path, start_ts, end_ts, source_name, &mut points, &mut paths);
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

fn visit_point(
    visit: &Visit,
    start_ts: Option<chrono::DateTime<chrono::Utc>>,
    end_ts: Option<chrono::DateTime<chrono::Utc>>,
    source_name: &str,
) -> Option<Point> {
    let candidate = visit.top_candidate.as_ref()?;
    let (lat, lng) = candidate
        .place_location
        .as_deref()
        .and_then(parse_geo_uri)?;

    let mut point = Point::new(lat, lng, PointKind::PlaceVisit);
    point.timestamp = start_ts;
    point.end_timestamp = end_ts;
    point.name = candidate.semantic_type.clone();
    point.place_id = candidate.place_id.clone();
    point.source_file = Some(source_name.to_string());
    Some(point)
}

fn normalize_activity(
    activity: &Activity,
    start_ts: Option<chrono::DateTime<chrono::Utc>>,
    end_ts: Option<chrono::DateTime<chrono::Utc>>,
    source_name: &str,
    points: &mut Vec<Point>,
    paths: &mut Vec<TrackPath>,
) {
    let activity_type = activity.top_candidate.as_ref().map(|c| c.kind.clone());
    let confidence = activity.top_candidate.as_ref().and_then(|c| c.probability);

    let start = activity.start.as_deref().and_then(parse_geo_uri);
    let end = activity.end.as_deref().and_then(parse_geo_uri);

    for ((lat, lng), timestamp) in [(start, start_ts), (end, end_ts)]
        .into_iter()
        .filter_map(|(coords, ts)| coords.map(|c| (c, ts)))
    {
        let mut marker = Point::new(lat, lng, PointKind::ActivityMarker);
        marker.timestamp = timestamp;
        marker.activity_type = activity_type.clone();
        marker.activity_confidence = confidence;
        marker.source_file = Some(source_name.to_string());
        points.push(marker);
    }

    // No detailed route in this schema's activity entries; the straight line
    // between the endpoints keeps every activity navigable.
    if let (Some((lat1, lng1)), Some((lat2, lng2))) = (start, end) {
        let mut path = TrackPath::new(vec![
            Coordinate::new(lat1, lng1),
            Coordinate::new(lat2, lng2),
        ]);
        path.activity_type = activity_type;
        path.start_timestamp = start_ts;
        path.end_timestamp = end_ts;
        path.distance_meters = activity.distance_meters;
        path.source_file = Some(source_name.to_string());
        paths.push(path);
    }
}

fn normalize_timeline_path(
    entries: &[TimelinePathEntry],
    start_ts: Option<chrono::DateTime<chrono::Utc>>,
    end_ts: Option<chrono::DateTime<chrono::Utc>>,
    source_name: &str,
    points: &mut Vec<Point>,
    paths: &mut Vec<TrackPath>,
) {
    let mut coordinates = Vec::new();
    for entry in entries {
        let Some(raw) = entry.point.as_deref() else { continue };
        let Some((lat, lng)) = parse_geo_uri(raw) else { continue };
        coordinates.push(Coordinate::new(lat, lng));

        let mut point = Point::new(lat, lng, PointKind::TrackPoint);
        point.timestamp = entry.time.as_deref().and_then(parse_timestamp);
        point.source_file = Some(source_name.to_string());
        points.push(point);
    }

    if coordinates.len() >= 2 {
        let mut path = TrackPath::new(coordinates);
        path.start_timestamp = start_ts;
        path.end_timestamp = end_ts;
        path.source_file = Some(source_name.to_string());
        paths.push(path);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    start_time: Option<String>,
    end_time: Option<String>,
    visit: Option<Visit>,
    activity: Option<Activity>,
    timeline_path: Option<Vec<TimelinePathEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Visit {
    top_candidate: Option<VisitCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitCandidate {
    place_location: Option<String>,
    #[serde(rename = "placeID")]
    place_id: Option<String>,
    semantic_type: Option<String>,
    #[allow(dead_code)]
    probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    top_candidate: Option<ActivityCandidate>,
    distance_meters: Option<f64>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityCandidate {
    #[serde(rename = "type")]
    kind: String,
    probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TimelinePathEntry {
    point: Option<String>,
    time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_visit_activity_and_path() {
        let doc = json!([
            {
                "startTime": "2024-01-15T08:00:00Z",
                "endTime": "2024-01-15T09:00:00Z",
                "visit": {
                    "topCandidate": {
                        "placeLocation": "geo:52.5200,13.4050",
                        "placeID": "ChIJhome",
                        "semanticType": "Home",
                        "probability": 0.93
                    }
                }
            },
            {
                "startTime": "2024-01-15T09:00:00Z",
                "endTime": "2024-01-15T09:25:00Z",
                "activity": {
                    "topCandidate": {"type": "in passenger vehicle", "probability": 0.87},
                    "distanceMeters": 4200.0,
                    "start": "geo:52.5200,13.4050",
                    "end": "geo:52.5400,13.4300"
                }
            },
            {
                "startTime": "2024-01-15T09:25:00Z",
                "endTime": "2024-01-15T09:40:00Z",
                "timelinePath": [
                    {"point": "geo:52.5400,13.4300", "time": "2024-01-15T09:25:00Z"},
                    {"point": "geo:52.5420,13.4350", "time": "2024-01-15T09:32:00Z"}
                ]
            }
        ]);

        let parsed = LocationHistoryNormalizer.normalize(&doc, "timeline.json");

        // 1 visit + 2 markers + 2 track points
        assert_eq!(parsed.points.len(), 5);
        assert_eq!(parsed.paths.len(), 2);

        let visit = parsed
            .points
            .iter()
            .find(|p| p.kind == PointKind::PlaceVisit)
            .unwrap();
        assert_eq!(visit.name.as_deref(), Some("Home"));
        assert_eq!(visit.place_id.as_deref(), Some("ChIJhome"));

        let activity_path = parsed
            .paths
            .iter()
            .find(|p| p.activity_type.is_some())
            .unwrap();
        assert_eq!(activity_path.coordinates.len(), 2);
        assert_eq!(activity_path.distance_meters, Some(4200.0));
        assert_eq!(
            activity_path.activity_type.as_deref(),
            Some("in passenger vehicle")
        );
    }

    #[test]
    fn test_activity_without_endpoints() {
        let doc = json!([
            {
                "startTime": "2024-01-15T09:00:00Z",
                "activity": {"topCandidate": {"type": "walking"}}
            }
        ]);
        let parsed = LocationHistoryNormalizer.normalize(&doc, "timeline.json");
        assert!(parsed.points.is_empty());
        assert!(parsed.paths.is_empty());
    }
}
