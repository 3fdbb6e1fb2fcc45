//! Semantic-segments normalizer
//!
//! Handles the `{semanticSegments: [...]}` export where every timeline path
//! point is a `geo:<lat>,<lng>` string with its own timestamp.

use super::{parse_timestamp, sort_points_by_time, SchemaNormalizer};
use crate::detector::TimelineFormat;
use crate::geomath::parse_geo_uri;
use crate::types::{Coordinate, ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the semanticSegments schema
pub struct SemanticSegmentsNormalizer;

impl SchemaNormalizer for SemanticSegmentsNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::SemanticSegments
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let payload: SemanticSegmentsFile = match serde_json::from_value(document.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{source_name}: semantic-segments payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        let mut points = Vec::new();
        let mut paths = Vec::new();

        for segment in &payload.semantic_segments {
            let entries = segment.timeline_path.as_deref().unwrap_or_default();
            let mut coordinates = Vec::new();

            for entry in entries {
                let Some(raw) = entry.point.as_deref() else { continue };
                let Some((lat, lng)) = parse_geo_uri(raw) else {
                    log::debug!("{source_name}: skipping unparseable timeline point {raw:?}");
                    continue;
                };
                coordinates.push(Coordinate::new(lat, lng));

                let mut point = Point::new(lat, lng, PointKind::TrackPoint);
                point.timestamp = entry.time.as_deref().and_then(parse_timestamp);
                point.source_file = Some(source_name.to_string());
                points.push(point);
            }

            if coordinates.len() >= 2 {
                let mut path = TrackPath::new(coordinates);
                path.start_timestamp = segment.start_time.as_deref().and_then(parse_timestamp);
                path.end_timestamp = segment.end_time.as_deref().and_then(parse_timestamp);
                path.source_file = Some(source_name.to_string());
                paths.push(path);
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticSegmentsFile {
    semantic_segments: Vec<SemanticSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticSegment {
    timeline_path: Option<Vec<TimelinePathEntry>>,
    start_time: Option<String>,
    end_time: Option<String>,
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
    fn test_normalize_semantic_segments() {
        let doc = json!({
            "semanticSegments": [{
                "startTime": "2024-01-15T08:00:00Z",
                "endTime": "2024-01-15T08:30:00Z",
                "timelinePath": [
                    {"point": "geo:52.5200,13.4050", "time": "2024-01-15T08:00:00Z"},
                    {"point": "52.5250,13.4100", "time": "2024-01-15T08:15:00Z"},
                    {"point": "geo:95.0,13.0", "time": "2024-01-15T08:20:00Z"},
                    {"point": "geo:52.5300,13.4150", "time": "2024-01-15T08:30:00Z"}
                ]
            }]
        });

        let parsed = SemanticSegmentsNormalizer.normalize(&doc, "segments.json");
        // Out-of-range point dropped
        assert_eq!(parsed.points.len(), 3);
        assert_eq!(parsed.paths.len(), 1);
        assert_eq!(parsed.paths[0].coordinates.len(), 3);
        assert!(parsed.points.iter().all(|p| p.kind == PointKind::TrackPoint));
        assert!(parsed.paths[0].start_timestamp.is_some());
    }

    #[test]
    fn test_single_point_segment_has_no_path() {
        let doc = json!({
            "semanticSegments": [{
                "timelinePath": [{"point": "geo:52.52,13.405"}]
            }]
        });
        let parsed = SemanticSegmentsNormalizer.normalize(&doc, "segments.json");
        assert_eq!(parsed.points.len(), 1);
        assert!(parsed.paths.is_empty());
    }
}
