//! GeoCodec: bidirectional mapping between the canonical model and GPS file
//! formats
//!
//! `decode` turns raw file bytes into a [`ParsedFile`]; `encode` serializes
//! canonical points and paths back out. Encoding never fails on empty input:
//! every encoder emits a structurally valid, empty document.
//!
//! Classification on encode: marker-class points ([`PointKind::is_marker`])
//! become discrete features (GPX `<wpt>`, KML `<Placemark><Point>`, GeoJSON
//! `Point`); line-class points are grouped in encounter order into one
//! continuous line; every [`TrackPath`] encodes as its own line.

mod csv_codec;
mod fit;
mod geojson;
mod gpx_codec;
mod kml_codec;
mod tcx;

pub use kml_codec::{decode_kmz, encode_kmz};

use crate::error::{GeoError, Result};
use crate::types::{ParsedFile, Point, TrackPath};
use serde::{Deserialize, Serialize};

/// Supported GPS interchange formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Gpx,
    Kml,
    Kmz,
    GeoJson,
    Csv,
    Fit,
    Tcx,
}

impl FileFormat {
    /// Map a file extension (case-insensitive, without the dot) to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gpx" => Some(FileFormat::Gpx),
            "kml" => Some(FileFormat::Kml),
            "kmz" => Some(FileFormat::Kmz),
            "geojson" | "json" => Some(FileFormat::GeoJson),
            "csv" => Some(FileFormat::Csv),
            "fit" => Some(FileFormat::Fit),
            "tcx" => Some(FileFormat::Tcx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Gpx => "gpx",
            FileFormat::Kml => "kml",
            FileFormat::Kmz => "kmz",
            FileFormat::GeoJson => "geojson",
            FileFormat::Csv => "csv",
            FileFormat::Fit => "fit",
            FileFormat::Tcx => "tcx",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

/// Options applied by every encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Document/collection name written into format metadata
    pub document_name: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            document_name: "trackfuse export".to_string(),
        }
    }
}

/// Decode raw file bytes in the given format into the canonical model
pub fn decode(bytes: &[u8], format: FileFormat, source_name: &str) -> Result<ParsedFile> {
    match format {
        FileFormat::Gpx => gpx_codec::decode(bytes, source_name),
        FileFormat::Kml => kml_codec::decode(bytes, source_name),
        FileFormat::Kmz => kml_codec::decode_kmz(bytes, source_name),
        FileFormat::GeoJson => geojson::decode(bytes, source_name),
        FileFormat::Csv => csv_codec::decode(bytes, source_name),
        FileFormat::Fit => fit::decode(bytes, source_name),
        FileFormat::Tcx => tcx::decode(bytes, source_name),
    }
}

/// Serialize canonical points and paths into the given format
pub fn encode(
    points: &[Point],
    paths: &[TrackPath],
    format: FileFormat,
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    match format {
        FileFormat::Gpx => gpx_codec::encode(points, paths, options),
        FileFormat::Kml => kml_codec::encode(points, paths, options),
        FileFormat::Kmz => kml_codec::encode_kmz(points, paths, options),
        FileFormat::GeoJson => geojson::encode(points, paths, options),
        FileFormat::Csv => csv_codec::encode(points, paths),
        FileFormat::Tcx => Err(GeoError::UnsupportedFormat(
            "TCX output is not supported".to_string(),
        )),
        FileFormat::Fit => Err(GeoError::UnsupportedFormat(
            "FIT output is not supported".to_string(),
        )),
    }
}

/// Split a point set into marker-class and line-class points, both in
/// encounter order.
pub(crate) fn classify_points<'a>(points: &'a [Point]) -> (Vec<&'a Point>, Vec<&'a Point>) {
    let mut markers = Vec::new();
    let mut line = Vec::new();
    for point in points {
        if point.kind.is_marker() {
            markers.push(point);
        } else {
            line.push(point);
        }
    }
    (markers, line)
}

/// Human-readable description for a marker: place address plus dwell duration
/// when both visit timestamps are known.
pub(crate) fn marker_description(point: &Point) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(address) = &point.address {
        parts.push(address.clone());
    }
    if let (Some(start), Some(end)) = (point.timestamp, point.end_timestamp) {
        parts.push(format!("Stayed {}", crate::geomath::format_duration(start, end)));
    }
    if let Some(activity) = &point.activity_type {
        parts.push(activity.clone());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
