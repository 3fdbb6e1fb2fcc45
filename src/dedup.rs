//! Deduplication and multi-file merging
//!
//! Overlapping exports from the same source produce near-duplicate fixes.
//! Dedup walks the time-sorted point stream and collapses a point into its
//! predecessor only when it is close in both space and time; the richer of
//! the two survives. Merge concatenates several parsed files, dedups the
//! union, and reports pairwise temporal overlap between the inputs.

use crate::geomath::haversine_distance;
use crate::types::{DateRange, MergeMetadata, MergeResult, OverlapReport, ParsedFile, Point};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

/// Thresholds for near-duplicate detection. The defaults (50 m, 60 s) are
/// heuristics tuned for phone-class sampling rates; callers with denser or
/// sparser data should adjust them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupOptions {
    pub distance_threshold_meters: f64,
    pub time_threshold_seconds: f64,
}

impl Default for DedupOptions {
    fn default() -> Self {
        DedupOptions {
            distance_threshold_meters: 50.0,
            time_threshold_seconds: 60.0,
        }
    }
}

/// Outcome of one dedup pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupResult {
    pub unique_points: Vec<Point>,
    pub duplicates_removed: usize,
}

/// Collapse near-duplicate fixes.
///
/// Points are sorted by timestamp (untimed points last, stable) and each is
/// compared against the most recently retained point. A point is a duplicate
/// only when the great-circle distance AND the time delta are both within
/// their thresholds; either alone is not enough. Running dedup on its own
/// output changes nothing further.
pub fn dedup(points: &[Point], options: &DedupOptions) -> DedupResult {
    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut unique: Vec<Point> = Vec::with_capacity(sorted.len());
    let mut duplicates_removed = 0usize;

    for point in sorted {
        let Some(last) = unique.last_mut() else {
            unique.push(point);
            continue;
        };

        if is_duplicate(last, &point, options) {
            duplicates_removed += 1;
            // Richer metadata wins
            if point.richness() > last.richness() {
                *last = point;
            }
        } else {
            unique.push(point);
        }
    }

    DedupResult {
        unique_points: unique,
        duplicates_removed,
    }
}

fn is_duplicate(retained: &Point, candidate: &Point, options: &DedupOptions) -> bool {
    let distance = haversine_distance(retained.lat, retained.lng, candidate.lat, candidate.lng);
    if distance > options.distance_threshold_meters {
        return false;
    }
    match (retained.timestamp, candidate.timestamp) {
        (Some(a), Some(b)) => {
            let delta_seconds = (b - a).num_milliseconds().abs() as f64 / 1000.0;
            delta_seconds <= options.time_threshold_seconds
        }
        // Without both timestamps the time condition cannot hold
        _ => false,
    }
}

/// Merge several parsed files: tag provenance, concatenate, dedup the point
/// union, and report pairwise temporal overlap. Zero inputs yield an empty
/// result, not an error.
pub fn merge(files: &[(String, ParsedFile)], options: &DedupOptions) -> MergeResult {
    let mut all_points = Vec::new();
    let mut all_paths = Vec::new();

    for (name, file) in files {
        for point in &file.points {
            let mut point = point.clone();
            point.source_file.get_or_insert_with(|| name.clone());
            all_points.push(point);
        }
        for path in &file.paths {
            let mut path = path.clone();
            path.source_file.get_or_insert_with(|| name.clone());
            all_paths.push(path);
        }
    }

    let total_input_points = all_points.len();
    let DedupResult {
        unique_points,
        duplicates_removed,
    } = dedup(&all_points, options);

    let overlaps = overlap_reports(files);

    MergeResult {
        metadata: MergeMetadata {
            total_input_points,
            total_output_points: unique_points.len(),
            duplicates_removed,
            overlaps,
        },
        points: unique_points,
        paths: all_paths,
    }
}

/// Pairwise overlap between every unordered pair of input files. Files with
/// no timestamped points have no date range and overlap nothing.
fn overlap_reports(files: &[(String, ParsedFile)]) -> Vec<OverlapReport> {
    let ranges: Vec<(&str, Option<DateRange>)> = files
        .iter()
        .map(|(name, file)| (name.as_str(), date_range(file)))
        .collect();

    let mut reports = Vec::new();
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (name_a, Some(range_a)) = ranges[i] else { continue };
            let (name_b, Some(range_b)) = ranges[j] else { continue };

            let overlap_start = range_a.start.max(range_b.start);
            let overlap_end = range_a.end.min(range_b.end);
            if overlap_start > overlap_end {
                continue;
            }

            let overlap_ms = (overlap_end - overlap_start).num_milliseconds();
            reports.push(OverlapReport {
                file_a: name_a.to_string(),
                file_b: name_b.to_string(),
                range_a,
                range_b,
                overlap_start,
                overlap_end,
                overlap_days: div_ceil(overlap_ms, MS_PER_DAY),
            });
        }
    }
    reports
}

/// Min/max timestamp over a file's points, None when nothing is timestamped
pub fn date_range(file: &ParsedFile) -> Option<DateRange> {
    let mut timestamps = file.points.iter().filter_map(|p| p.timestamp);
    let first = timestamps.next()?;
    let (start, end) = timestamps.fold((first, first), |(min, max), ts| {
        (min.min(ts), max.max(ts))
    });
    Some(DateRange { start, end })
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}
