//! Pipeline orchestration
//!
//! The public entry points for whole-file operations: sniff a file's format,
//! convert bytes into the canonical model, re-encode into another format, and
//! run multi-file batches where one file's failure never aborts the rest.

use crate::codec::{self, EncodeOptions, FileFormat};
use crate::detector::{detect_format, TimelineFormat};
use crate::error::{GeoError, Result};
use crate::normalizers::normalize_document;
use crate::types::ParsedFile;
use serde_json::Value;

/// Outcome of one file in a batch; failures are captured per-file
#[derive(Debug)]
pub struct FileOutcome {
    pub source: String,
    pub result: Result<ParsedFile>,
}

/// Decode one file into the canonical model.
///
/// The format is taken from the file extension: GPS formats route through the
/// codec, `.json` routes through schema detection and the matching
/// normalizer, falling back to GeoJSON when the document is a
/// FeatureCollection. Unrecognized JSON normalizes to an empty set rather
/// than failing.
pub fn convert(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    match format_of(source_name) {
        Some(FileFormat::GeoJson) | None => convert_json(bytes, source_name),
        Some(format) => codec::decode(bytes, format, source_name),
    }
}

fn convert_json(bytes: &[u8], source_name: &str) -> Result<ParsedFile> {
    let document: Value = serde_json::from_slice(bytes)?;

    match detect_format(&document) {
        TimelineFormat::Unknown => {
            if document.get("type").and_then(Value::as_str) == Some("FeatureCollection") {
                codec::decode(bytes, FileFormat::GeoJson, source_name)
            } else {
                log::debug!("{source_name}: no known schema matched");
                Ok(ParsedFile::empty(TimelineFormat::Unknown.as_str()))
            }
        }
        _ => Ok(normalize_document(&document, source_name)),
    }
}

/// Convert one file straight through to another format's bytes.
///
/// Surfaces [`GeoError::NoUsableData`] when the decoded input is empty: the
/// requested conversion would otherwise produce an empty document.
pub fn convert_to(
    bytes: &[u8],
    source_name: &str,
    output: FileFormat,
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let parsed = convert(bytes, source_name)?;
    if parsed.is_empty() {
        return Err(GeoError::NoUsableData(source_name.to_string()));
    }
    codec::encode(&parsed.points, &parsed.paths, output, options)
}

/// Decode a batch of files, capturing each failure alongside its source name.
pub fn convert_batch(inputs: &[(String, Vec<u8>)]) -> Vec<FileOutcome> {
    inputs
        .iter()
        .map(|(source, bytes)| FileOutcome {
            source: source.clone(),
            result: convert(bytes, source),
        })
        .collect()
}

/// Sniff the location-history schema variant of a JSON document
pub fn detect(bytes: &[u8]) -> Result<TimelineFormat> {
    let document: Value = serde_json::from_slice(bytes)?;
    Ok(detect_format(&document))
}

fn format_of(source_name: &str) -> Option<FileFormat> {
    let extension = source_name.rsplit('.').next()?;
    FileFormat::from_extension(extension)
}
