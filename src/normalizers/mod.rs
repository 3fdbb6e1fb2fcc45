//! Schema normalizers
//!
//! One normalizer per detected location-history variant, each mapping the raw
//! JSON document into the canonical [`ParsedFile`] model. Normalizers never
//! fail: structurally broken entries are skipped (and logged), unrecognized
//! documents produce an empty result, so one bad file cannot abort a batch.

mod location_history;
mod raw_fixes;
mod semantic_segments;
mod semantic_visits;
mod settings;
mod timeline_edits;

pub use location_history::LocationHistoryNormalizer;
pub use raw_fixes::RawFixesNormalizer;
pub use semantic_segments::SemanticSegmentsNormalizer;
pub use semantic_visits::SemanticVisitsNormalizer;
pub use settings::SettingsNormalizer;
pub use timeline_edits::TimelineEditsNormalizer;

use crate::detector::{detect_format, TimelineFormat};
use crate::types::{ParsedFile, Point};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Trait for schema normalizers
pub trait SchemaNormalizer {
    /// The schema variant this normalizer handles
    fn format(&self) -> TimelineFormat;

    /// Map a decoded document into the canonical model
    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile;
}

/// Detect the schema variant of `document` and run the matching normalizer.
///
/// Unknown documents normalize to an empty [`ParsedFile`] tagged `unknown`.
pub fn normalize_document(document: &Value, source_name: &str) -> ParsedFile {
    let format = detect_format(document);
    let normalizer: &dyn SchemaNormalizer = match format {
        TimelineFormat::RawFixes => &RawFixesNormalizer,
        TimelineFormat::SemanticVisits => &SemanticVisitsNormalizer,
        TimelineFormat::Settings => &SettingsNormalizer,
        TimelineFormat::TimelineEdits => &TimelineEditsNormalizer,
        TimelineFormat::SemanticSegments => &SemanticSegmentsNormalizer,
        TimelineFormat::LocationHistory => &LocationHistoryNormalizer,
        TimelineFormat::Unknown => {
            log::debug!("{source_name}: unrecognized document structure");
            return ParsedFile::empty(TimelineFormat::Unknown.as_str());
        }
    };
    normalizer.normalize(document, source_name)
}

/// Parse an ISO-8601 timestamp string
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a millisecond epoch carried as either a JSON string or number
pub(crate) fn parse_timestamp_ms(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

/// Select the activity candidate with the highest confidence; ties keep the
/// first-seen candidate. Candidates without a confidence never displace one
/// that has it.
pub(crate) fn pick_top_activity<I>(candidates: I) -> Option<(String, Option<f64>)>
where
    I: IntoIterator<Item = (String, Option<f64>)>,
{
    let mut best: Option<(String, Option<f64>)> = None;
    for (kind, confidence) in candidates {
        let better = match &best {
            None => true,
            Some((_, best_conf)) => match confidence {
                Some(c) => c > best_conf.unwrap_or(f64::NEG_INFINITY),
                None => false,
            },
        };
        if better {
            best = Some((kind, confidence));
        }
    }
    best
}

/// Stable ascending sort by timestamp. Points lacking a timestamp keep their
/// encountered order relative to everything around them.
pub(crate) fn sort_points_by_time(points: &mut [Point]) {
    points.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointKind;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_ms_string_and_number() {
        let from_string = parse_timestamp_ms(&json!("1705305600000")).unwrap();
        let from_number = parse_timestamp_ms(&json!(1_705_305_600_000_i64)).unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(from_string.to_rfc3339(), "2024-01-15T08:00:00+00:00");
        assert!(parse_timestamp_ms(&json!(null)).is_none());
    }

    #[test]
    fn test_pick_top_activity_max_confidence() {
        let picked = pick_top_activity(vec![
            ("WALKING".to_string(), Some(40.0)),
            ("IN_VEHICLE".to_string(), Some(85.0)),
            ("STILL".to_string(), Some(85.0)),
        ])
        .unwrap();
        // Ties keep first-seen
        assert_eq!(picked.0, "IN_VEHICLE");
        assert_eq!(picked.1, Some(85.0));
    }

    #[test]
    fn test_pick_top_activity_missing_confidence() {
        let picked = pick_top_activity(vec![
            ("WALKING".to_string(), None),
            ("CYCLING".to_string(), Some(10.0)),
        ])
        .unwrap();
        assert_eq!(picked.0, "CYCLING");

        let only_unscored = pick_top_activity(vec![("WALKING".to_string(), None)]).unwrap();
        assert_eq!(only_unscored.0, "WALKING");
        assert!(pick_top_activity(Vec::new()).is_none());
    }

    #[test]
    fn test_sort_keeps_untimed_points_in_place() {
        let t1 = parse_timestamp("2024-01-15T09:00:00Z");
        let t0 = parse_timestamp("2024-01-15T08:00:00Z");
        let mut points = vec![
            {
                let mut p = Point::new(1.0, 1.0, PointKind::RawFix);
                p.timestamp = t1;
                p
            },
            Point::new(2.0, 2.0, PointKind::RawFix),
            {
                let mut p = Point::new(3.0, 3.0, PointKind::RawFix);
                p.timestamp = t0;
                p
            },
        ];
        sort_points_by_time(&mut points);
        // The untimed point never compares against its neighbors, so the
        // timed pair around it cannot be reordered across it.
        assert_eq!(points[1].lat, 2.0);
    }

    #[test]
    fn test_normalize_document_unknown_is_empty() {
        let parsed = normalize_document(&json!({"unrelated": true}), "mystery.json");
        assert!(parsed.is_empty());
        assert_eq!(parsed.metadata.format, "unknown");
    }
}
