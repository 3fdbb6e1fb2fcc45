//! KML 2.2 and KMZ decode/encode
//!
//! Decoding walks the KML element tree recursively: Point placemarks become
//! marker points, LineString placemarks become canonical paths. KMZ is the
//! same document zipped under an internal `doc.kml` entry; any `*.kml` entry
//! is accepted on decode. Encoding writes a `<Document>` of Placemarks via a
//! streaming XML writer.

use super::{classify_points, marker_description, EncodeOptions};
use crate::error::{GeoError, Result};
use crate::geomath::valid_coords;
use crate::types::{Coordinate, ParseMetadata, ParsedFile, Point, PointKind, TrackPath};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Read, Write as _};
use std::str::FromStr;

pub fn decode(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let text = String::from_utf8_lossy(bytes);
    let document = kml::Kml::from_str(&text).map_err(|e| GeoError::MalformedXml {
        format: "KML",
        file: source_name.to_string(),
        message: e.to_string(),
    })?;

    let mut points = Vec::new();
    let mut paths = Vec::new();
    collect_elements(&document, source_name, &mut points, &mut paths);

    Ok(ParsedFile {
        metadata: ParseMetadata {
            format: "kml".to_string(),
            point_count: points.len(),
            path_count: paths.len(),
            ..Default::default()
        },
        points,
        paths,
    })
}

/// Decode a KMZ archive: unzip, find the KML entry, decode it.
pub fn decode_kmz(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let kml_index = (0..archive.len()).find(|&i| {
        archive
            .by_index(i)
            .map(|entry| {
                let name = entry.name().to_ascii_lowercase();
                name == "doc.kml" || name.ends_with(".kml")
            })
            .unwrap_or(false)
    });

    let Some(index) = kml_index else {
        return Err(GeoError::NoKmlEntry(source_name.to_string()));
    };

    let mut content = String::new();
    archive.by_index(index)?.read_to_string(&mut content)?;

    let mut parsed = decode(content.as_bytes(), source_name)?;
    parsed.metadata.format = "kmz".to_string();
    Ok(parsed)
}

pub fn encode(points: &[Point], paths: &[TrackPath], options: &EncodeOptions) -> Result<Vec<u8>> {
    let (markers, line_points) = classify_points(points);

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_xml(&mut writer, &markers, &line_points, paths, options)
        .map_err(|e| GeoError::EncodingError(e.to_string()))?;
    Ok(writer.into_inner().into_inner())
}

/// Encode to KML and zip it as the archive's `doc.kml` entry.
pub fn encode_kmz(points: &[Point], paths: &[TrackPath], options: &EncodeOptions) -> Result<Vec<u8>> {
    let kml_bytes = encode(points, paths, options)?;

    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let zip_options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    archive.start_file("doc.kml", zip_options)?;
    archive.write_all(&kml_bytes)?;
    Ok(archive.finish()?.into_inner())
}

fn collect_elements(
    element: &kml::Kml,
    source_name: &str,
    points: &mut Vec<Point>,
    paths: &mut Vec<TrackPath>,
) {
    match element {
        kml::Kml::KmlDocument(doc) => {
            for child in &doc.elements {
                collect_elements(child, source_name, points, paths);
            }
        }
        kml::Kml::Document { elements, .. } | kml::Kml::Folder(kml::types::Folder { elements, .. }) => {
            for child in elements {
                collect_elements(child, source_name, points, paths);
            }
        }
        kml::Kml::Placemark(placemark) => {
            if let Some(geometry) = &placemark.geometry {
                collect_geometry(geometry, placemark.name.as_deref(), source_name, points, paths);
            }
        }
        _ => {}
    }
}

/// Recurse through a placemark geometry, including nested MultiGeometry.
fn collect_geometry(
    geometry: &kml::types::Geometry,
    name: Option<&str>,
    source_name: &str,
    points: &mut Vec<Point>,
    paths: &mut Vec<TrackPath>,
) {
    use kml::types::Geometry;

    match geometry {
        Geometry::Point(point) => {
            if !valid_coords(point.coord.y, point.coord.x) {
                return;
            }
            let mut p = Point::new(point.coord.y, point.coord.x, PointKind::Waypoint);
            p.altitude = point.coord.z;
            p.name = name.map(str::to_string);
            p.source_file = Some(source_name.to_string());
            points.push(p);
        }
        Geometry::LineString(line) => {
            let coordinates: Vec<Coordinate> = line
                .coords
                .iter()
                .filter(|c| valid_coords(c.y, c.x))
                .map(|c| Coordinate::new(c.y, c.x))
                .collect();
            if coordinates.len() >= 2 {
                let mut path = TrackPath::new(coordinates);
                path.activity_type = name.map(str::to_string);
                path.source_file = Some(source_name.to_string());
                paths.push(path);
            }
        }
        Geometry::MultiGeometry(multi) => {
            for nested in &multi.geometries {
                collect_geometry(nested, name, source_name, points, paths);
            }
        }
        _ => {}
    }
}

type XmlResult = std::result::Result<(), quick_xml::Error>;

fn write_xml(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    markers: &[&Point],
    line_points: &[&Point],
    paths: &[TrackPath],
    options: &EncodeOptions,
) -> XmlResult {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut kml_start = BytesStart::new("kml");
    kml_start.push_attribute(("xmlns", "http://www.opengis.net/kml/2.2"));
    writer.write_event(Event::Start(kml_start))?;
    writer.write_event(Event::Start(BytesStart::new("Document")))?;
    write_text(writer, "name", &options.document_name)?;

    for marker in markers {
        writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
        if let Some(name) = &marker.name {
            write_text(writer, "name", name)?;
        }
        if let Some(description) = marker_description(marker) {
            write_text(writer, "description", &description)?;
        }
        writer.write_event(Event::Start(BytesStart::new("Point")))?;
        write_text(writer, "coordinates", &coordinate_tuple(marker))?;
        writer.write_event(Event::End(BytesEnd::new("Point")))?;
        writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    }

    if !line_points.is_empty() {
        let coords: Vec<String> = line_points.iter().map(|p| coordinate_tuple(p)).collect();
        write_line_placemark(writer, &options.document_name, &coords)?;
    }

    for path in paths {
        let coords: Vec<String> = path
            .coordinates
            .iter()
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect();
        let name = path.activity_type.as_deref().unwrap_or("Path");
        write_line_placemark(writer, name, &coords)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Document")))?;
    writer.write_event(Event::End(BytesEnd::new("kml")))?;
    Ok(())
}

fn write_line_placemark(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    coords: &[String],
) -> XmlResult {
    writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
    write_text(writer, "name", name)?;
    writer.write_event(Event::Start(BytesStart::new("LineString")))?;
    write_text(writer, "tessellate", "1")?;
    write_text(writer, "coordinates", &coords.join(" "))?;
    writer.write_event(Event::End(BytesEnd::new("LineString")))?;
    writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    Ok(())
}

fn write_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> XmlResult {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// KML coordinate order is lng,lat[,alt]
fn coordinate_tuple(point: &Point) -> String {
    match point.altitude {
        Some(alt) => format!("{},{},{}", point.lng, point.lat, alt),
        None => format!("{},{}", point.lng, point.lat),
    }
}
