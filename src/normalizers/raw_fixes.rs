//! Raw-fixes normalizer
//!
//! Handles the legacy `{locations: [...]}` export where coordinates are
//! E7-scaled integers and each fix may carry nested activity classifications.

use super::{parse_timestamp, parse_timestamp_ms, pick_top_activity, sort_points_by_time, SchemaNormalizer};
use crate::detector::TimelineFormat;
use crate::geomath::{decode_e7, valid_coords};
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the E7 raw-fixes schema
pub struct RawFixesNormalizer;

impl SchemaNormalizer for RawFixesNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::RawFixes
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let payload: RawFixesFile = match serde_json::from_value(document.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{source_name}: raw-fixes payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        let mut points = Vec::new();
        let mut dropped = 0usize;

        for location in &payload.locations {
            let (lat_e7, lng_e7) = match (location.latitude_e7, location.longitude_e7) {
                (Some(lat), Some(lng)) => (lat, lng),
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            let lat = decode_e7(lat_e7);
            let lng = decode_e7(lng_e7);
            if !valid_coords(lat, lng) {
                dropped += 1;
                continue;
            }

            let mut point = Point::new(lat, lng, PointKind::RawFix);
            point.timestamp = location
                .timestamp
                .as_deref()
                .and_then(parse_timestamp)
                .or_else(|| location.timestamp_ms.as_ref().and_then(parse_timestamp_ms));
            point.accuracy = location.accuracy;
            point.altitude = location.altitude;
            point.velocity = location.velocity;
            point.heading = location.heading;
            point.source_file = Some(source_name.to_string());

            if let Some(top) = top_activity(location) {
                point.activity_type = Some(top.0);
                point.activity_confidence = top.1;
            }

            points.push(point);
        }

        if dropped > 0 {
            log::debug!("{source_name}: dropped {dropped} fixes with missing or invalid coordinates");
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

/// Flatten all nested activity candidates of one fix and pick the most
/// confident classification.
fn top_activity(location: &RawLocation) -> Option<(String, Option<f64>)> {
    let candidates = location
        .activity
        .as_deref()
        .unwrap_or_default()
        .iter()
        .flat_map(|record| record.activity.as_deref().unwrap_or_default())
        .map(|candidate| (candidate.kind.clone(), candidate.confidence));
    pick_top_activity(candidates)
}

#[derive(Debug, Deserialize)]
struct RawFixesFile {
    locations: Vec<RawLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    latitude_e7: Option<i64>,
    longitude_e7: Option<i64>,
    timestamp: Option<String>,
    timestamp_ms: Option<Value>,
    accuracy: Option<f64>,
    altitude: Option<f64>,
    velocity: Option<f64>,
    heading: Option<f64>,
    activity: Option<Vec<ActivityRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRecord {
    activity: Option<Vec<ActivityCandidate>>,
}

#[derive(Debug, Deserialize)]
struct ActivityCandidate {
    #[serde(rename = "type")]
    kind: String,
    confidence: Option<f64>,
}
