//! GPX 1.1 decode/encode
//!
//! Decoding maps waypoints, track points, and route points into canonical
//! points, preserving elevation and timestamps. Encoding writes marker-class
//! points as `<wpt>` entries, line-class points as one `<trk>`, and each
//! canonical path as its own `<trk>`.

use super::{classify_points, marker_description, EncodeOptions};
use crate::error::{GeoError, Result};
use crate::geomath::valid_coords;
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use chrono::{DateTime, Utc};
use gpx::{Gpx, GpxVersion, Metadata, Track, TrackSegment, Waypoint};

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let document: Gpx = gpx::read(bytes).map_err(|e| GeoError::MalformedXml {
        format: "GPX",
        file: source_name.to_string(),
        message: e.to_string(),
    })?;

    let mut points = Vec::new();

    for wp in &document.waypoints {
        if let Some(point) = from_waypoint(wp, PointKind::Waypoint, source_name) {
            points.push(point);
        }
    }

    for track in &document.tracks {
        for segment in &track.segments {
            for wp in &segment.points {
                if let Some(mut point) = from_waypoint(wp, PointKind::TrackPoint, source_name) {
                    if point.name.is_none() {
                        point.name = track.name.clone();
                    }
                    points.push(point);
                }
            }
        }
    }

    for route in &document.routes {
        for wp in &route.points {
            if let Some(point) = from_waypoint(wp, PointKind::RoutePoint, source_name) {
                points.push(point);
            }
        }
    }

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "gpx".to_string(),
            point_count: points.len(),
            path_count: 0,
            ..Default::default()
        },
        points,
        paths: Vec::new(),
    })
}

pub fn encode(points: &[Point], paths: &[TrackPath], options: &EncodeOptions) -> Result<Vec<u8>> {
    let (markers, line_points) = classify_points(points);

    let mut document = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("trackfuse".to_string()),
        metadata: Some(Metadata {
            name: Some(options.document_name.clone()),
            ..Default::default()
        }),
        ..Default::default()
    };

    for point in markers {
        document.waypoints.push(to_waypoint(point));
    }

    if !line_points.is_empty() {
        let mut segment = TrackSegment::new();
        for point in line_points {
            segment.points.push(to_waypoint(point));
        }
        let mut track = Track::new();
        track.name = Some(options.document_name.clone());
        track.segments.push(segment);
        document.tracks.push(track);
    }

    for path in paths {
        let mut segment = TrackSegment::new();
        for coord in &path.coordinates {
            segment
                .points
                .push(Waypoint::new(geo_types::Point::new(coord.lng, coord.lat)));
        }
        let mut track = Track::new();
        track.name = path.activity_type.clone();
        track.type_ = path.activity_type.clone();
        track.segments.push(segment);
        document.tracks.push(track);
    }

    let mut out = Vec::new();
    gpx::write(&document, &mut out).map_err(|e| GeoError::EncodingError(e.to_string()))?;
    Ok(out)
}

fn from_waypoint(wp: &Waypoint, kind: PointKind, source_name: &str) -> Option<Point> {
    let lat = wp.point().y();
    let lng = wp.point().x();
    if !valid_coords(lat, lng) {
        return None;
    }

    let mut point = Point::new(lat, lng, kind);
    point.altitude = wp.elevation;
    point.timestamp = wp
        .time
        .and_then(|t| t.format().ok())
        .as_deref()
        .and_then(parse_iso_time);
    point.name = wp.name.clone();
    point.source_file = Some(source_name.to_string());
    Some(point)
}

fn to_waypoint(point: &Point) -> Waypoint {
    let mut wp = Waypoint::new(geo_types::Point::new(point.lng, point.lat));
    wp.elevation = point.altitude;
    wp.time = point.timestamp.and_then(to_gpx_time);
    wp.name = point.name.clone();
    wp.description = marker_description(point);
    wp.speed = point.velocity;
    wp
}

fn parse_iso_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_gpx_time(ts: DateTime<Utc>) -> Option<gpx::Time> {
    let nanos = i128::from(ts.timestamp()) * 1_000_000_000 + i128::from(ts.timestamp_subsec_nanos());
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .map(gpx::Time::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode as codec_decode, FileFormat};

    fn track_point(lat: f64, lng: f64, ele: f64, ts: &str) -> Point {
        let mut p = Point::new(lat, lng, PointKind::TrackPoint);
        p.altitude = Some(ele);
        p.timestamp = Some(ts.parse().unwrap());
        p
    }

    #[test]
    fn test_decode_waypoints_and_tracks() {
        let gpx_content = br#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="TestApp">
  <wpt lat="47.644548" lon="-122.326897">
    <ele>184.0</ele>
    <name>Space Needle</name>
  </wpt>
  <trk>
    <name>Morning Run</name>
    <trkseg>
      <trkpt lat="47.644548" lon="-122.326897">
        <ele>10.0</ele>
        <time>2024-01-15T07:00:00Z</time>
      </trkpt>
      <trkpt lat="47.645000" lon="-122.327000">
        <ele>12.0</ele>
        <time>2024-01-15T07:01:00Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;

        let parsed = decode(gpx_content, "run.gpx").unwrap();
        assert_eq!(parsed.points.len(), 3);

        let waypoint = &parsed.points[0];
        assert_eq!(waypoint.kind, PointKind::Waypoint);
        assert_eq!(waypoint.name.as_deref(), Some("Space Needle"));
        assert_eq!(waypoint.altitude, Some(184.0));

        let trackpoint = &parsed.points[1];
        assert_eq!(trackpoint.kind, PointKind::TrackPoint);
        assert!(trackpoint.timestamp.is_some());
    }

    #[test]
    fn test_decode_malformed_names_file() {
        let err = decode(b"<gpx><unclosed", "broken.gpx").unwrap_err();
        match err {
            GeoError::MalformedXml { file, .. } => assert_eq!(file, "broken.gpx"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_roundtrip_track_points() {
        let points = vec![
            track_point(47.6445, -122.3268, 10.0, "2024-01-15T07:00:00Z"),
            track_point(47.6450, -122.3270, 12.5, "2024-01-15T07:01:00Z"),
            track_point(47.6455, -122.3275, 15.0, "2024-01-15T07:02:00Z"),
        ];

        let bytes = encode(&points, &[], &EncodeOptions::default()).unwrap();
        let decoded = codec_decode(&bytes, FileFormat::Gpx, "roundtrip.gpx").unwrap();

        assert_eq!(decoded.points.len(), 3);
        for (original, restored) in points.iter().zip(decoded.points.iter()) {
            assert!((original.lat - restored.lat).abs() < 1e-9);
            assert!((original.lng - restored.lng).abs() < 1e-9);
            assert_eq!(original.altitude, restored.altitude);
            assert_eq!(original.timestamp, restored.timestamp);
        }
    }

    #[test]
    fn test_encode_empty_is_valid() {
        let bytes = encode(&[], &[], &EncodeOptions::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<gpx"));
        let decoded = decode(text.as_bytes(), "empty.gpx").unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_encode_markers_and_paths() {
        let mut marker = Point::new(52.52, 13.405, PointKind::Waypoint);
        marker.name = Some("Start".to_string());

        let mut path = TrackPath::new(vec![
            crate::types::Coordinate::new(52.52, 13.405),
            crate::types::Coordinate::new(52.53, 13.415),
        ]);
        path.activity_type = Some("CYCLING".to_string());

        let bytes = encode(&[marker], &[path], &EncodeOptions::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<wpt"));
        assert!(text.contains("<trk"));
        assert!(text.contains("CYCLING"));
    }
}
