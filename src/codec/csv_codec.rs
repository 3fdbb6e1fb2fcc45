//! CSV decode/encode
//!
//! Fixed column layout: `latitude,longitude,elevation,time,type,name`. The
//! csv crate handles quoting of embedded commas and quotes. Paths are
//! flattened to track-point rows on encode since CSV has no line geometry.

use crate::error::Result;
use crate::geomath::valid_coords;
use crate::types::{ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use serde::{Deserialize, Serialize};

const HEADERS: [&str; 6] = ["latitude", "longitude", "elevation", "time", "type", "name"];

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let mut points = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::debug!("{source_name}: skipping unreadable CSV row: {e}");
                continue;
            }
        };
        let (Some(lat), Some(lng)) = (row.latitude, row.longitude) else {
            continue;
        };
        if !valid_coords(lat, lng) {
            continue;
        }

        let kind = row
            .kind
            .as_deref()
            .and_then(kind_from_str)
            .unwrap_or(PointKind::TrackPoint);
        let mut point = Point::new(lat, lng, kind);
        point.altitude = row.elevation;
        point.timestamp = row.time.as_deref().and_then(|t| t.parse().ok());
        point.name = row.name.filter(|n| !n.is_empty());
        point.source_file = Some(source_name.to_string());
        points.push(point);
    }

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "csv".to_string(),
            point_count: points.len(),
            path_count: 0,
            ..Default::default()
        },
        points,
        paths: Vec::new(),
    })
}

pub fn encode(points: &[Point], paths: &[TrackPath]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADERS)?;

    for point in points {
        writer.serialize(CsvRow {
            latitude: Some(point.lat),
            longitude: Some(point.lng),
            elevation: point.altitude,
            time: point.timestamp.map(|t| t.to_rfc3339()),
            kind: Some(point.kind.as_str().to_string()),
            name: point.name.clone(),
        })?;
    }

    for path in paths {
        for coord in &path.coordinates {
            writer.serialize(CsvRow {
                latitude: Some(coord.lat),
                longitude: Some(coord.lng),
                elevation: None,
                time: None,
                kind: Some(PointKind::TrackPoint.as_str().to_string()),
                name: path.activity_type.clone(),
            })?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| crate::error::GeoError::EncodingError(e.to_string()))
}

fn kind_from_str(value: &str) -> Option<PointKind> {
    match value.to_ascii_lowercase().as_str() {
        "raw-fix" | "rawfix" => Some(PointKind::RawFix),
        "place-visit" | "placevisit" | "visit" => Some(PointKind::PlaceVisit),
        "activity-marker" => Some(PointKind::ActivityMarker),
        "raw-signal" => Some(PointKind::RawSignal),
        "place-aggregate" => Some(PointKind::PlaceAggregate),
        "track-point" | "trackpoint" => Some(PointKind::TrackPoint),
        "waypoint" | "wpt" => Some(PointKind::Waypoint),
        "route-point" | "routepoint" => Some(PointKind::RoutePoint),
        _ => None,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    time: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
}
