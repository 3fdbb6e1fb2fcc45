//! Location-history schema detection
//!
//! The location-history ecosystem has shipped several incompatible JSON
//! schemas over the years. Detection is structural duck-typing: an ordered
//! list of discriminator predicates is evaluated against the decoded document
//! until one matches. Unrecognized documents classify as [`TimelineFormat::Unknown`]
//! and normalize to an empty canonical set; detection never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identified location-history schema variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimelineFormat {
    /// `{locations: [...]}` with E7 coordinates
    RawFixes,
    /// `{timelineObjects: [...]}` with placeVisit/activitySegment entries
    SemanticVisits,
    /// `{deviceSettings: [...]}` device inventory, no coordinates
    Settings,
    /// `{timelineEdits: [...]}` with placeAggregates/rawSignal entries
    TimelineEdits,
    /// `{semanticSegments: [...]}` with `geo:` string timeline paths
    SemanticSegments,
    /// Top-level array of visit/activity/timelinePath entries
    LocationHistory,
    Unknown,
}

impl TimelineFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineFormat::RawFixes => "raw-fixes",
            TimelineFormat::SemanticVisits => "semantic-visits",
            TimelineFormat::Settings => "settings",
            TimelineFormat::TimelineEdits => "timeline-edits",
            TimelineFormat::SemanticSegments => "semantic-segments",
            TimelineFormat::LocationHistory => "location-history",
            TimelineFormat::Unknown => "unknown",
        }
    }
}

/// Discriminators in fixed priority order; first match wins.
const DISCRIMINATORS: &[(TimelineFormat, fn(&Value) -> bool)] = &[
    (TimelineFormat::RawFixes, has_array_key_locations),
    (TimelineFormat::SemanticVisits, has_array_key_timeline_objects),
    (TimelineFormat::Settings, has_array_key_device_settings),
    (TimelineFormat::TimelineEdits, has_array_key_timeline_edits),
    (TimelineFormat::SemanticSegments, has_array_key_semantic_segments),
    (TimelineFormat::LocationHistory, is_location_history_array),
];

/// Classify a decoded JSON document into one of the known schema variants
pub fn detect_format(document: &Value) -> TimelineFormat {
    for (format, matches) in DISCRIMINATORS {
        if matches(document) {
            return *format;
        }
    }
    TimelineFormat::Unknown
}

fn has_array_key(document: &Value, key: &str) -> bool {
    document.get(key).map(Value::is_array).unwrap_or(false)
}

fn has_array_key_locations(document: &Value) -> bool {
    has_array_key(document, "locations")
}

fn has_array_key_timeline_objects(document: &Value) -> bool {
    has_array_key(document, "timelineObjects")
}

fn has_array_key_device_settings(document: &Value) -> bool {
    has_array_key(document, "deviceSettings")
}

fn has_array_key_timeline_edits(document: &Value) -> bool {
    has_array_key(document, "timelineEdits")
}

fn has_array_key_semantic_segments(document: &Value) -> bool {
    has_array_key(document, "semanticSegments")
}

/// The newest export drops the wrapper object entirely: the document root is
/// an array of entries carrying startTime plus visit/activity/timelinePath.
fn is_location_history_array(document: &Value) -> bool {
    match document.as_array() {
        Some(entries) => entries.iter().any(|entry| {
            entry.get("startTime").is_some()
                && (entry.get("visit").is_some()
                    || entry.get("activity").is_some()
                    || entry.get("timelinePath").is_some())
        }),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_raw_fixes() {
        let doc = json!({"locations": [{"latitudeE7": 525000000, "longitudeE7": 134000000}]});
        assert_eq!(detect_format(&doc), TimelineFormat::RawFixes);
    }

    #[test]
    fn test_detect_semantic_visits() {
        let doc = json!({"timelineObjects": [{"placeVisit": {}}]});
        assert_eq!(detect_format(&doc), TimelineFormat::SemanticVisits);
    }

    #[test]
    fn test_detect_settings() {
        let doc = json!({"deviceSettings": [{"deviceTag": 12345}]});
        assert_eq!(detect_format(&doc), TimelineFormat::Settings);
    }

    #[test]
    fn test_detect_timeline_edits() {
        let doc = json!({"timelineEdits": [{"rawSignal": {}}]});
        assert_eq!(detect_format(&doc), TimelineFormat::TimelineEdits);
    }

    #[test]
    fn test_detect_semantic_segments() {
        let doc = json!({"semanticSegments": [{"timelinePath": []}]});
        assert_eq!(detect_format(&doc), TimelineFormat::SemanticSegments);
    }

    #[test]
    fn test_detect_location_history_array() {
        let doc = json!([
            {"startTime": "2024-01-15T08:00:00Z", "endTime": "2024-01-15T09:00:00Z",
             "visit": {"topCandidate": {"placeLocation": "geo:52.5,13.4"}}}
        ]);
        assert_eq!(detect_format(&doc), TimelineFormat::LocationHistory);
    }

    #[test]
    fn test_priority_order_prefers_locations() {
        // A pathological document with both keys classifies by priority
        let doc = json!({"locations": [], "timelineObjects": []});
        assert_eq!(detect_format(&doc), TimelineFormat::RawFixes);
    }

    #[test]
    fn test_unknown_documents() {
        assert_eq!(detect_format(&json!({"foo": "bar"})), TimelineFormat::Unknown);
        assert_eq!(detect_format(&json!([1, 2, 3])), TimelineFormat::Unknown);
        assert_eq!(detect_format(&json!("scalar")), TimelineFormat::Unknown);
        // locations present but not an array
        assert_eq!(
            detect_format(&json!({"locations": "nope"})),
            TimelineFormat::Unknown
        );
    }
}
