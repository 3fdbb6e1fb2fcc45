//! Timeline-edits normalizer
//!
//! Handles the `{timelineEdits: [...]}` export: placeAggregates entries carry
//! frequently-visited places (no timestamps), rawSignal entries carry
//! low-level position signals.

use super::{parse_timestamp, sort_points_by_time, SchemaNormalizer};
use crate::detector::TimelineFormat;
use crate::geomath::{decode_e7, valid_coords};
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the timelineEdits schema
pub struct TimelineEditsNormalizer;

impl SchemaNormalizer for TimelineEditsNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::TimelineEdits
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let payload: TimelineEditsFile = match serde_json::from_value(document.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{source_name}: timeline-edits payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        let mut points = Vec::new();

        for edit in &payload.timeline_edits {
            if let Some(aggregates) = &edit.place_aggregates {
                for info in &aggregates.place_aggregate_info {
                    let Some(point) = &info.point else { continue };
                    if let Some((lat, lng)) = e7_pair(point.lat_e7, point.lng_e7) {
                        let mut p = Point::new(lat, lng, PointKind::PlaceAggregate);
                        p.place_id = info.place_id.clone();
                        p.source_file = Some(source_name.to_string());
                        points.push(p);
                    }
                }
            }
            if let Some(raw_signal) = &edit.raw_signal {
                let Some(position) = raw_signal.signal.as_ref().and_then(|s| s.position.as_ref())
                else {
                    continue;
                };
                let Some(point) = &position.point else { continue };
                if let Some((lat, lng)) = e7_pair(point.lat_e7, point.lng_e7) {
                    let mut p = Point::new(lat, lng, PointKind::RawSignal);
                    p.timestamp = position.timestamp.as_deref().and_then(parse_timestamp);
                    p.source_file = Some(source_name.to_string());
                    points.push(p);
                }
            }
        }

        sort_points_by_time(&mut points);

        ParsedFile {
            metadata: ParseMetadata {
                format: self.format().as_str().to_string(),
                point_count: points.len(),
                path_count: 0,
                ..Default::default()
            },
            points,
            paths: Vec::new(),
        }
    }
}

fn e7_pair(lat_e7: Option<i64>, lng_e7: Option<i64>) -> Option<(f64, f64)> {
    let lat = decode_e7(lat_e7?);
    let lng = decode_e7(lng_e7?);
    valid_coords(lat, lng).then_some((lat, lng))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineEditsFile {
    timeline_edits: Vec<TimelineEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineEdit {
    place_aggregates: Option<PlaceAggregates>,
    raw_signal: Option<RawSignal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceAggregates {
    #[serde(default)]
    place_aggregate_info: Vec<PlaceAggregateInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceAggregateInfo {
    point: Option<E7Point>,
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSignal {
    signal: Option<Signal>,
}

#[derive(Debug, Deserialize)]
struct Signal {
    position: Option<Position>,
}

#[derive(Debug, Deserialize)]
struct Position {
    point: Option<E7Point>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct E7Point {
    lat_e7: Option<i64>,
    lng_e7: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_timeline_edits() {
        let doc = json!({
            "timelineEdits": [
                {
                    "placeAggregates": {
                        "placeAggregateInfo": [
                            {"point": {"latE7": 525200000, "lngE7": 134050000}, "placeId": "ChIJabc"},
                            {"point": {"latE7": 2_000_000_000i64, "lngE7": 0}}
                        ]
                    }
                },
                {
                    "rawSignal": {
                        "signal": {
                            "position": {
                                "point": {"latE7": 525210000, "lngE7": 134060000},
                                "timestamp": "2024-01-15T08:00:00Z"
                            }
                        }
                    }
                }
            ]
        });

        let parsed = TimelineEditsNormalizer.normalize(&doc, "edits.json");
        assert_eq!(parsed.points.len(), 2);

        let aggregate = parsed
            .points
            .iter()
            .find(|p| p.kind == PointKind::PlaceAggregate)
            .unwrap();
        assert_eq!(aggregate.place_id.as_deref(), Some("ChIJabc"));
        assert!(aggregate.timestamp.is_none());

        let signal = parsed
            .points
            .iter()
            .find(|p| p.kind == PointKind::RawSignal)
            .unwrap();
        assert!(signal.timestamp.is_some());
        assert_eq!(signal.lat, 52.521);
    }

    #[test]
    fn test_empty_edits() {
        let parsed = TimelineEditsNormalizer.normalize(&json!({"timelineEdits": []}), "edits.json");
        assert!(parsed.is_empty());
    }
}
