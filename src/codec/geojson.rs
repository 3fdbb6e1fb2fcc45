//! GeoJSON decode/encode
//!
//! A `FeatureCollection` of `Point` and `LineString` features. Point features
//! map to marker points, LineString features to canonical paths. GeoJSON
//! coordinate order is [lng, lat, alt?].

use super::{classify_points, EncodeOptions};
use crate::error::Result;
use crate::geomath::valid_coords;
use crate::types::{Coordinate, ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let collection: FeatureCollection = serde_json::from_slice(bytes)?;

    let mut points = Vec::new();
    let mut paths = Vec::new();

    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else { continue };
        match geometry.kind.as_str() {
            "Point" => {
                let Some(position) = as_position(&geometry.coordinates) else { continue };
                if !valid_coords(position.1, position.0) {
                    continue;
                }
                let mut point = Point::new(position.1, position.0, PointKind::Waypoint);
                point.altitude = position.2;
                point.name = feature.property_str("name");
                point.timestamp = feature
                    .property_str("time")
                    .as_deref()
                    .and_then(|t| t.parse().ok());
                point.activity_type = feature.property_str("activityType");
                point.source_file = Some(source_name.to_string());
                points.push(point);
            }
            "LineString" => {
                let Some(positions) = geometry.coordinates.as_array() else { continue };
                let coordinates: Vec<Coordinate> = positions
                    .iter()
                    .filter_map(as_position)
                    .filter(|(lng, lat, _)| valid_coords(*lat, *lng))
                    .map(|(lng, lat, _)| Coordinate::new(lat, lng))
                    .collect();
                if coordinates.len() >= 2 {
                    let mut path = TrackPath::new(coordinates);
                    path.activity_type = feature.property_str("activityType");
                    path.start_timestamp = feature
                        .property_str("startTime")
                        .as_deref()
                        .and_then(|t| t.parse().ok());
                    path.end_timestamp = feature
                        .property_str("endTime")
                        .as_deref()
                        .and_then(|t| t.parse().ok());
                    path.source_file = Some(source_name.to_string());
                    paths.push(path);
                }
            }
            _ => {}
        }
    }

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "geojson".to_string(),
            point_count: points.len(),
            path_count: paths.len(),
            ..Default::default()
        },
        points,
        paths,
    })
}

pub fn encode(points: &[Point], paths: &[TrackPath], options: &EncodeOptions) -> Result<Vec<u8>> {
    let (markers, line_points) = classify_points(points);
    let mut features = Vec::new();

    for marker in markers {
        features.push(point_feature(marker));
    }

    if !line_points.is_empty() {
        let coordinates: Vec<Value> = line_points.iter().map(|p| position(p)).collect();
        let mut properties = Map::new();
        properties.insert("name".to_string(), Value::from(options.document_name.clone()));
        features.push(Feature {
            kind: "Feature".to_string(),
            geometry: Some(Geometry {
                kind: "LineString".to_string(),
                coordinates: Value::Array(coordinates),
            }),
            properties: Some(properties),
        });
    }

    for path in paths {
        let coordinates: Vec<Value> = path
            .coordinates
            .iter()
            .map(|c| Value::Array(vec![Value::from(c.lng), Value::from(c.lat)]))
            .collect();
        let mut properties = Map::new();
        if let Some(activity) = &path.activity_type {
            properties.insert("activityType".to_string(), Value::from(activity.clone()));
        }
        if let Some(start) = path.start_timestamp {
            properties.insert("startTime".to_string(), Value::from(start.to_rfc3339()));
        }
        if let Some(end) = path.end_timestamp {
            properties.insert("endTime".to_string(), Value::from(end.to_rfc3339()));
        }
        if let Some(distance) = path.distance_meters {
            properties.insert("distanceMeters".to_string(), Value::from(distance));
        }
        features.push(Feature {
            kind: "Feature".to_string(),
            geometry: Some(Geometry {
                kind: "LineString".to_string(),
                coordinates: Value::Array(coordinates),
            }),
            properties: Some(properties),
        });
    }

    let collection = FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features,
    };
    serde_json::to_vec_pretty(&collection).map_err(Into::into)
}

fn point_feature(point: &Point) -> Feature {
    let mut properties = Map::new();
    if let Some(name) = &point.name {
        properties.insert("name".to_string(), Value::from(name.clone()));
    }
    if let Some(ts) = point.timestamp {
        properties.insert("time".to_string(), Value::from(ts.to_rfc3339()));
    }
    if let Some(activity) = &point.activity_type {
        properties.insert("activityType".to_string(), Value::from(activity.clone()));
    }
    properties.insert("kind".to_string(), Value::from(point.kind.as_str()));

    Feature {
        kind: "Feature".to_string(),
        geometry: Some(Geometry {
            kind: "Point".to_string(),
            coordinates: position(point),
        }),
        properties: Some(properties),
    }
}

fn position(point: &Point) -> Value {
    match point.altitude {
        Some(alt) => Value::Array(vec![
            Value::from(point.lng),
            Value::from(point.lat),
            Value::from(alt),
        ]),
        None => Value::Array(vec![Value::from(point.lng), Value::from(point.lat)]),
    }
}

/// Extract (lng, lat, alt?) from a GeoJSON position array
fn as_position(value: &Value) -> Option<(f64, f64, Option<f64>)> {
    let parts = value.as_array()?;
    let lng = parts.first()?.as_f64()?;
    let lat = parts.get(1)?.as_f64()?;
    let alt = parts.get(2).and_then(Value::as_f64);
    Some((lng, lat, alt))
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    geometry: Option<Geometry>,
    properties: Option<Map<String, Value>>,
}

impl Feature {
    fn property_str(&self, key: &str) -> Option<String> {
        self.properties
            .as_ref()
            .and_then(|props| props.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_feature_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [13.405, 52.52, 34.0]},
                    "properties": {"name": "Alexanderplatz", "time": "2024-01-15T08:00:00Z"}
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[13.405, 52.52], [13.410, 52.525], [13.415, 52.53]]
                    },
                    "properties": {"activityType": "WALKING"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [200.0, 95.0]},
                    "properties": {}
                }
            ]
        });

        let parsed = decode(doc.to_string().as_bytes(), "city.geojson").unwrap();
        assert_eq!(parsed.points.len(), 1);
        assert_eq!(parsed.paths.len(), 1);

        let marker = &parsed.points[0];
        assert_eq!(marker.name.as_deref(), Some("Alexanderplatz"));
        assert_eq!(marker.altitude, Some(34.0));
        assert!(marker.timestamp.is_some());

        assert_eq!(parsed.paths[0].activity_type.as_deref(), Some("WALKING"));
    }

    #[test]
    fn test_encode_then_decode() {
        let mut marker = Point::new(52.52, 13.405, PointKind::PlaceVisit);
        marker.name = Some("Alexanderplatz".to_string());
        let mut track_point = Point::new(52.53, 13.415, PointKind::TrackPoint);
        track_point.timestamp = Some("2024-01-15T08:00:00Z".parse().unwrap());
        let other = Point::new(52.54, 13.425, PointKind::TrackPoint);

        let bytes = encode(
            &[marker, track_point, other],
            &[],
            &EncodeOptions::default(),
        )
        .unwrap();
        let parsed = decode(&bytes, "out.geojson").unwrap();

        // One Point feature + the grouped LineString
        assert_eq!(parsed.points.len(), 1);
        assert_eq!(parsed.paths.len(), 1);
        assert_eq!(parsed.paths[0].coordinates.len(), 2);
    }

    #[test]
    fn test_encode_empty_is_valid() {
        let bytes = encode(&[], &[], &EncodeOptions::default()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 0);
    }
}
