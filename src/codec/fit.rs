//! FIT binary decode
//!
//! Walks the decoded message stream by kind: `record` messages carry GPS
//! fixes (both `position_lat` and `position_long` must be present, in
//! semicircles), `lap` boundaries become waypoints when a start position
//! exists, and session metadata is surfaced as a human-readable description
//! built from only the fields that are present.

use crate::error::{GeoError, Result};
use crate::geomath::valid_coords;
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind};
use chrono::{DateTime, Utc};
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value as FitValue};

/// Degrees per semicircle: 180 / 2^31
const SEMICIRCLE_SCALE: f64 = 180.0 / 2_147_483_648.0;

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let messages = fitparser::de::from_bytes(bytes).map_err(|e| GeoError::FitParse {
        file: source_name.to_string(),
        message: e.to_string(),
    })?;

    let mut points = Vec::new();
    let mut lap_count = 0usize;
    let mut session = SessionSummary::default();

    for message in &messages {
        match message.kind() {
            MesgNum::Record => {
                if let Some(point) = record_point(message, source_name) {
                    points.push(point);
                }
            }
            MesgNum::Lap => {
                lap_count += 1;
                if let Some(point) = lap_waypoint(message, lap_count, source_name) {
                    points.push(point);
                }
            }
            MesgNum::Session => session.absorb(message),
            _ => {}
        }
    }

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "fit".to_string(),
            point_count: points.len(),
            path_count: 0,
            device_count: None,
            description: session.describe(),
        },
        points,
        paths: Vec::new(),
    })
}

fn record_point(message: &FitDataRecord, source_name: &str) -> Option<Point> {
    let lat = semicircles(field_f64(message, "position_lat")?);
    let lng = semicircles(field_f64(message, "position_long")?);
    if !valid_coords(lat, lng) {
        return None;
    }

    let mut point = Point::new(lat, lng, PointKind::TrackPoint);
    point.timestamp = field_timestamp(message, "timestamp");
    point.altitude = field_f64(message, "enhanced_altitude").or_else(|| field_f64(message, "altitude"));
    point.velocity = field_f64(message, "enhanced_speed").or_else(|| field_f64(message, "speed"));
    point.source_file = Some(source_name.to_string());
    Some(point)
}

fn lap_waypoint(message: &FitDataRecord, lap_number: usize, source_name: &str) -> Option<Point> {
    let lat = semicircles(field_f64(message, "start_position_lat")?);
    let lng = semicircles(field_f64(message, "start_position_long")?);
    if !valid_coords(lat, lng) {
        return None;
    }

    let mut point = Point::new(lat, lng, PointKind::Waypoint);
    point.name = Some(format!("Lap {lap_number}"));
    point.timestamp = field_timestamp(message, "start_time").or_else(|| field_timestamp(message, "timestamp"));
    point.source_file = Some(source_name.to_string());
    Some(point)
}

fn semicircles(value: f64) -> f64 {
    value * SEMICIRCLE_SCALE
}

fn field_f64(message: &FitDataRecord, name: &str) -> Option<f64> {
    message
        .fields()
        .iter()
        .find(|f| f.name() == name)
        .and_then(|f| fit_value_to_f64(f.value()))
}

fn field_string(message: &FitDataRecord, name: &str) -> Option<String> {
    message.fields().iter().find(|f| f.name() == name).and_then(|f| match f.value() {
        FitValue::String(s) => Some(s.clone()),
        other => fit_value_to_f64(other).map(|v| v.to_string()),
    })
}

fn field_timestamp(message: &FitDataRecord, name: &str) -> Option<DateTime<Utc>> {
    message.fields().iter().find(|f| f.name() == name).and_then(|f| match f.value() {
        FitValue::Timestamp(ts) => Some(ts.with_timezone(&Utc)),
        _ => None,
    })
}

fn fit_value_to_f64(value: &FitValue) -> Option<f64> {
    match value {
        FitValue::Float32(v) => Some(f64::from(*v)),
        FitValue::Float64(v) => Some(*v),
        FitValue::SInt8(v) => Some(f64::from(*v)),
        FitValue::SInt16(v) => Some(f64::from(*v)),
        FitValue::SInt32(v) => Some(f64::from(*v)),
        FitValue::SInt64(v) => Some(*v as f64),
        FitValue::UInt8(v) => Some(f64::from(*v)),
        FitValue::UInt16(v) => Some(f64::from(*v)),
        FitValue::UInt32(v) => Some(f64::from(*v)),
        FitValue::UInt64(v) => Some(*v as f64),
        FitValue::String(s) => s.parse().ok(),
        FitValue::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}

/// Session/activity metadata collected across session messages
#[derive(Debug, Default)]
struct SessionSummary {
    sport: Option<String>,
    total_distance_m: Option<f64>,
    total_time_s: Option<f64>,
    avg_heart_rate: Option<f64>,
    max_heart_rate: Option<f64>,
    total_ascent_m: Option<f64>,
}

impl SessionSummary {
    fn absorb(&mut self, message: &FitDataRecord) {
        if self.sport.is_none() {
            self.sport = field_string(message, "sport");
        }
        self.total_distance_m = self.total_distance_m.or_else(|| field_f64(message, "total_distance"));
        self.total_time_s = self.total_time_s.or_else(|| field_f64(message, "total_timer_time"));
        self.avg_heart_rate = self.avg_heart_rate.or_else(|| field_f64(message, "avg_heart_rate"));
        self.max_heart_rate = self.max_heart_rate.or_else(|| field_f64(message, "max_heart_rate"));
        self.total_ascent_m = self.total_ascent_m.or_else(|| field_f64(message, "total_ascent"));
    }

    /// Concatenate only the fields that are present; None when nothing is.
    fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(sport) = &self.sport {
            parts.push(format!("Sport: {sport}"));
        }
        if let Some(distance) = self.total_distance_m {
            parts.push(format!("Distance: {distance:.1} m"));
        }
        if let Some(time) = self.total_time_s {
            parts.push(format!("Time: {time:.0} s"));
        }
        if let Some(avg) = self.avg_heart_rate {
            parts.push(format!("Avg HR: {avg:.0} bpm"));
        }
        if let Some(max) = self.max_heart_rate {
            parts.push(format!("Max HR: {max:.0} bpm"));
        }
        if let Some(ascent) = self.total_ascent_m {
            parts.push(format!("Ascent: {ascent:.0} m"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicircle_conversion() {
        // 2^30 semicircles = 90 degrees
        assert!((semicircles(1_073_741_824.0) - 90.0).abs() < 1e-9);
        assert!((semicircles(-1_073_741_824.0) + 90.0).abs() < 1e-9);
        assert_eq!(semicircles(0.0), 0.0);
    }

    #[test]
    fn test_decode_garbage_propagates_error() {
        let err = decode(b"definitely not a fit file", "ride.fit").unwrap_err();
        match err {
            GeoError::FitParse { file, .. } => assert_eq!(file, "ride.fit"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_session_description_only_present_fields() {
        let summary = SessionSummary {
            sport: Some("cycling".to_string()),
            total_distance_m: Some(42_195.2),
            total_time_s: None,
            avg_heart_rate: Some(142.0),
            max_heart_rate: None,
            total_ascent_m: None,
        };
        assert_eq!(
            summary.describe().unwrap(),
            "Sport: cycling, Distance: 42195.2 m, Avg HR: 142 bpm"
        );

        assert!(SessionSummary::default().describe().is_none());
    }
}
