//! Splitting and archive packaging
//!
//! Partitions a canonical point stream by target size, point count, or
//! calendar date, re-encodes each partition through the codec, and packages
//! the chunks into one ZIP archive with deterministic entry names.

use crate::codec::{self, EncodeOptions, FileFormat};
use crate::error::Result;
use crate::types::Point;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write as _};

/// Date bucketing granularity for [`SplitStrategy::ByDate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    Year,
    Month,
}

/// Partitioning strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "strategy")]
pub enum SplitStrategy {
    /// Aim for chunks of roughly `target_bytes` encoded size, using a fixed
    /// bytes-per-point estimate for the output format
    BySize { target_bytes: usize },
    /// Contiguous slices of `points_per_chunk` points, no reordering
    ByCount { points_per_chunk: usize },
    /// Buckets keyed by calendar year or year-month of each point's own
    /// timestamp; points without one land in a dedicated `no-date` bucket
    ByDate { granularity: DateGranularity },
}

/// One partition, labeled for deterministic file naming
#[derive(Debug, Clone)]
pub struct Chunk {
    pub label: String,
    pub points: Vec<Point>,
}

/// Rough encoded bytes per point, by output format
fn bytes_per_point(format: FileFormat) -> usize {
    match format {
        FileFormat::Gpx => 180,
        FileFormat::GeoJson => 150,
        FileFormat::Kml | FileFormat::Kmz => 160,
        FileFormat::Csv => 80,
        _ => 120,
    }
}

/// Partition `points` according to `strategy`. The concatenation of all
/// chunks' points, in order, always equals the input sequence.
pub fn split(points: &[Point], strategy: &SplitStrategy, format: FileFormat) -> Vec<Chunk> {
    match strategy {
        SplitStrategy::BySize { target_bytes } => {
            let per_chunk = (target_bytes / bytes_per_point(format)).max(1);
            split_by_count(points, per_chunk)
        }
        SplitStrategy::ByCount { points_per_chunk } => {
            split_by_count(points, (*points_per_chunk).max(1))
        }
        SplitStrategy::ByDate { granularity } => split_by_date(points, *granularity),
    }
}

fn split_by_count(points: &[Point], per_chunk: usize) -> Vec<Chunk> {
    points
        .chunks(per_chunk)
        .enumerate()
        .map(|(index, slice)| Chunk {
            label: format!("{:03}", index + 1),
            points: slice.to_vec(),
        })
        .collect()
}

fn split_by_date(points: &[Point], granularity: DateGranularity) -> Vec<Chunk> {
    // Buckets keep first-seen order, then sort by label with no-date last
    let mut chunks: Vec<Chunk> = Vec::new();
    for point in points {
        let label = match point.timestamp {
            Some(ts) => match granularity {
                DateGranularity::Year => format!("{}", ts.year()),
                DateGranularity::Month => format!("{}-{:02}", ts.year(), ts.month()),
            },
            None => "no-date".to_string(),
        };
        match chunks.iter_mut().find(|c| c.label == label) {
            Some(chunk) => chunk.points.push(point.clone()),
            None => chunks.push(Chunk {
                label,
                points: vec![point.clone()],
            }),
        }
    }
    chunks.sort_by(|a, b| match (a.label.as_str(), b.label.as_str()) {
        ("no-date", "no-date") => std::cmp::Ordering::Equal,
        ("no-date", _) => std::cmp::Ordering::Greater,
        (_, "no-date") => std::cmp::Ordering::Less,
        (x, y) => x.cmp(y),
    });
    chunks
}

/// Encode every chunk in `format` and package the results as a ZIP archive.
/// Entry names are `<base>_<label>.<ext>`.
pub fn package_zip(chunks: &[Chunk], format: FileFormat, base_name: &str) -> Result<Vec<u8>> {
    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let zip_options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for chunk in chunks {
        let options = EncodeOptions {
            document_name: format!("{base_name}_{}", chunk.label),
        };
        let encoded = codec::encode(&chunk.points, &[], format, &options)?;
        let entry_name = format!("{base_name}_{}.{}", chunk.label, format.extension());
        archive.start_file(entry_name, zip_options)?;
        archive.write_all(&encoded)?;
    }

    Ok(archive.finish()?.into_inner())
}
