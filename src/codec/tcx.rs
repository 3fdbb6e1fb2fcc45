//! TCX decode
//!
//! Training Center XML: `Activity` elements contain `Lap`s, each with a
//! `Track` of `Trackpoint`s. A `Trackpoint` without a `Position` element is a
//! sensor-only reading (heart rate, cadence) and is skipped entirely; it is
//! not a location.

use crate::error::{GeoError, Result};
use crate::geomath::valid_coords;
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);

    let mut points = Vec::new();
    let mut sport: Option<String> = None;
    let mut lap_count = 0usize;

    let mut in_trackpoint = false;
    let mut in_position = false;
    let mut current = TrackpointFields::default();
    let mut element_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                match name.as_str() {
                    "Activity" => {
                        if sport.is_none() {
                            sport = start
                                .try_get_attribute("Sport")
                                .ok()
                                .flatten()
                                .and_then(|a| a.unescape_value().ok())
                                .map(|v| v.to_string());
                        }
                    }
                    "Lap" => lap_count += 1,
                    "Trackpoint" => {
                        in_trackpoint = true;
                        current = TrackpointFields::default();
                    }
                    "Position" => in_position = in_trackpoint,
                    _ => {}
                }
                element_stack.push(name);
            }
            Ok(Event::End(end)) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
                match name.as_str() {
                    "Trackpoint" => {
                        in_trackpoint = false;
                        if let Some(point) = current.take_point(sport.as_deref(), source_name) {
                            points.push(point);
                        }
                    }
                    "Position" => in_position = false,
                    _ => {}
                }
                element_stack.pop();
            }
            Ok(Event::Text(text)) => {
                if !in_trackpoint {
                    continue;
                }
                let Some(element) = element_stack.last() else { continue };
                let value = text
                    .unescape()
                    .map_err(|e| malformed(source_name, e))?
                    .to_string();
                match element.as_str() {
                    "LatitudeDegrees" if in_position => current.lat = value.parse().ok(),
                    "LongitudeDegrees" if in_position => current.lng = value.parse().ok(),
                    "AltitudeMeters" => current.altitude = value.parse().ok(),
                    "Time" => current.time = parse_time(&value),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(source_name, e)),
        }
    }

    let description = sport.as_ref().map(|s| match lap_count {
        0 | 1 => format!("Sport: {s}"),
        n => format!("Sport: {s}, Laps: {n}"),
    });

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "tcx".to_string(),
            point_count: points.len(),
            path_count: 0,
            device_count: None,
            description,
        },
        points,
        paths: Vec::new(),
    })
}

fn malformed(source_name: &str, error: quick_xml::Error) -> GeoError {
    GeoError::MalformedXml {
        format: "TCX",
        file: source_name.to_string(),
        message: error.to_string(),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Default)]
struct TrackpointFields {
    lat: Option<f64>,
    lng: Option<f64>,
    altitude: Option<f64>,
    time: Option<DateTime<Utc>>,
}

impl TrackpointFields {
    /// Build a canonical point; sensor-only trackpoints (no position) and
    /// out-of-range positions yield None.
    fn take_point(&mut self, sport: Option<&str>, source_name: &str) -> Option<Point> {
        let (lat, lng) = (self.lat.take()?, self.lng.take()?);
        if !valid_coords(lat, lng) {
            return None;
        }
        let mut point = Point::new(lat, lng, PointKind::TrackPoint);
        point.altitude = self.altitude.take();
        point.timestamp = self.time.take();
        point.activity_type = sport.map(str::to_string);
        point.source_file = Some(source_name.to_string());
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2024-01-15T07:00:00Z</Id>
      <Lap StartTime="2024-01-15T07:00:00Z">
        <Track>
          <Trackpoint>
            <Time>2024-01-15T07:00:00Z</Time>
            <Position>
              <LatitudeDegrees>52.5200</LatitudeDegrees>
              <LongitudeDegrees>13.4050</LongitudeDegrees>
            </Position>
            <AltitudeMeters>34.0</AltitudeMeters>
            <HeartRateBpm><Value>120</Value></HeartRateBpm>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-01-15T07:00:05Z</Time>
            <HeartRateBpm><Value>124</Value></HeartRateBpm>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-01-15T07:00:10Z</Time>
            <Position>
              <LatitudeDegrees>52.5210</LatitudeDegrees>
              <LongitudeDegrees>13.4060</LongitudeDegrees>
            </Position>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    #[test]
    fn test_decode_skips_sensor_only_trackpoints() {
        let parsed = decode(SAMPLE_TCX.as_bytes(), "ride.tcx").unwrap();

        // The heart-rate-only trackpoint is not a location
        assert_eq!(parsed.points.len(), 2);
        assert_eq!(parsed.metadata.description.as_deref(), Some("Sport: Biking"));

        let first = &parsed.points[0];
        assert!((first.lat - 52.52).abs() < 1e-9);
        assert_eq!(first.altitude, Some(34.0));
        assert!(first.timestamp.is_some());
        assert_eq!(first.activity_type.as_deref(), Some("Biking"));
    }

    #[test]
    fn test_decode_malformed_names_file() {
        let err = decode(b"<TrainingCenterDatabase><Activity", "broken.tcx").unwrap_err();
        match err {
            GeoError::MalformedXml { file, format, .. } => {
                assert_eq!(file, "broken.tcx");
                assert_eq!(format, "TCX");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_decode_empty_document() {
        let parsed = decode(
            br#"<?xml version="1.0"?><TrainingCenterDatabase></TrainingCenterDatabase>"#,
            "empty.tcx",
        )
        .unwrap();
        assert!(parsed.is_empty());
    }
}
