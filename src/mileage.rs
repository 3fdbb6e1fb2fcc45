//! Mileage ledger
//!
//! Filters the canonical model down to driving-class movement, turns each
//! surviving path into a trip, aggregates per-day and per-month summaries,
//! and renders the ledger as CSV with a trailing total row.

use crate::geomath::{format_duration, haversine_distance};
use crate::stats::path_distance;
use crate::types::{
    DailyMileage, DistanceUnit, MileageLog, MonthlyMileage, Point, TrackPath, Trip,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activity classes that count toward mileage
const DRIVING_KEYWORDS: [&str; 5] = ["passenger vehicle", "bus", "train", "subway", "motorcycl"];

/// Options for [`generate_mileage_log`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MileageOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub unit: DistanceUnit,
}

impl Default for MileageOptions {
    fn default() -> Self {
        MileageOptions {
            start_date: None,
            end_date: None,
            unit: DistanceUnit::Kilometers,
        }
    }
}

/// Whether an activity classification counts as driving
pub fn is_driving_activity(activity: &str) -> bool {
    let normalized = activity.to_ascii_lowercase().replace('_', " ");
    DRIVING_KEYWORDS.iter().any(|k| normalized.contains(k))
}

/// Build a mileage ledger from driving-class paths. For sources lacking
/// path-level detail, consecutive driving-tagged points stand in: each
/// unbroken run becomes one trip measured by the Haversine walk over it.
pub fn generate_mileage_log(
    points: &[Point],
    paths: &[TrackPath],
    options: &MileageOptions,
) -> MileageLog {
    let mut trips: Vec<Trip> = paths
        .iter()
        .filter(|path| {
            path.activity_type
                .as_deref()
                .map(is_driving_activity)
                .unwrap_or(false)
        })
        .filter(|path| in_window(path.start_timestamp.or(path.end_timestamp), options))
        .map(|path| trip_from_path(path, options.unit))
        .collect();

    if trips.is_empty() {
        trips = trips_from_points(points, options);
    }

    let total_distance = trips.iter().map(|t| t.distance).sum();
    let daily_summary = daily_summary(&trips);
    let monthly_summary = monthly_summary(&trips);

    MileageLog {
        trips,
        total_distance,
        unit: options.unit,
        daily_summary,
        monthly_summary,
    }
}

/// Render a mileage ledger as CSV: one row per trip plus a trailing total row.
pub fn mileage_csv(log: &MileageLog) -> crate::error::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record([
        "Trip #".to_string(),
        "Date".to_string(),
        "Start Time".to_string(),
        "End Time".to_string(),
        "Activity Type".to_string(),
        format!("Distance ({})", log.unit.as_str()),
        "Duration".to_string(),
    ])?;

    for (index, trip) in log.trips.iter().enumerate() {
        writer.write_record([
            (index + 1).to_string(),
            trip.date.clone(),
            trip.start_time.map(format_clock).unwrap_or_default(),
            trip.end_time.map(format_clock).unwrap_or_default(),
            trip.activity_type.clone(),
            format!("{:.2}", trip.distance),
            trip.duration.clone().unwrap_or_default(),
        ])?;
    }

    writer.write_record([
        "Total".to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        format!("{:.2}", log.total_distance),
        String::new(),
    ])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::error::GeoError::EncodingError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| crate::error::GeoError::EncodingError(e.to_string()))
}

fn trip_from_path(path: &TrackPath, unit: DistanceUnit) -> Trip {
    let distance_meters = path_distance(path);
    let duration = match (path.start_timestamp, path.end_timestamp) {
        (Some(start), Some(end)) => Some(format_duration(start, end)),
        _ => None,
    };
    Trip {
        id: path.id.clone(),
        date: trip_date(path.start_timestamp.or(path.end_timestamp)),
        start_time: path.start_timestamp,
        end_time: path.end_timestamp,
        activity_type: path.activity_type.clone().unwrap_or_default(),
        distance_meters,
        distance: unit.from_meters(distance_meters),
        duration,
    }
}

/// Group consecutive driving-tagged points into trips.
fn trips_from_points(points: &[Point], options: &MileageOptions) -> Vec<Trip> {
    let mut sorted: Vec<&Point> = points.iter().collect();
    sorted.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut trips = Vec::new();
    let mut run: Vec<&Point> = Vec::new();
    let mut run_activity: Option<String> = None;

    for point in sorted {
        let driving = point
            .activity_type
            .as_deref()
            .map(is_driving_activity)
            .unwrap_or(false);
        if driving && in_window(point.timestamp, options) {
            if run_activity.is_none() {
                run_activity = point.activity_type.clone();
            }
            run.push(point);
        } else if !run.is_empty() {
            if let Some(trip) = trip_from_run(&run, run_activity.take(), options.unit) {
                trips.push(trip);
            }
            run.clear();
        }
    }
    if let Some(trip) = trip_from_run(&run, run_activity, options.unit) {
        trips.push(trip);
    }
    trips
}

fn trip_from_run(run: &[&Point], activity: Option<String>, unit: DistanceUnit) -> Option<Trip> {
    if run.len() < 2 {
        return None;
    }
    let distance_meters: f64 = run
        .windows(2)
        .map(|pair| haversine_distance(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng))
        .sum();
    let start = run.first().and_then(|p| p.timestamp);
    let end = run.last().and_then(|p| p.timestamp);
    let duration = match (start, end) {
        (Some(s), Some(e)) => Some(format_duration(s, e)),
        _ => None,
    };

    Some(Trip {
        id: Uuid::new_v4().to_string(),
        date: trip_date(start.or(end)),
        start_time: start,
        end_time: end,
        activity_type: activity.unwrap_or_default(),
        distance_meters,
        distance: unit.from_meters(distance_meters),
        duration,
    })
}

fn in_window(timestamp: Option<DateTime<Utc>>, options: &MileageOptions) -> bool {
    if options.start_date.is_none() && options.end_date.is_none() {
        return true;
    }
    let Some(ts) = timestamp else { return false };
    let date = ts.date_naive();
    if let Some(start) = options.start_date {
        if date < start {
            return false;
        }
    }
    if let Some(end) = options.end_date {
        if date > end {
            return false;
        }
    }
    true
}

fn trip_date(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn format_clock(ts: DateTime<Utc>) -> String {
    ts.format("%H:%M:%S").to_string()
}

fn daily_summary(trips: &[Trip]) -> Vec<DailyMileage> {
    let mut days: Vec<DailyMileage> = Vec::new();
    for trip in trips {
        match days.iter_mut().find(|d| d.date == trip.date) {
            Some(day) => {
                day.trip_count += 1;
                day.distance += trip.distance;
            }
            None => days.push(DailyMileage {
                date: trip.date.clone(),
                trip_count: 1,
                distance: trip.distance,
            }),
        }
    }
    days.sort_by(|a, b| a.date.cmp(&b.date));
    days
}

fn monthly_summary(trips: &[Trip]) -> Vec<MonthlyMileage> {
    let mut months: Vec<MonthlyMileage> = Vec::new();
    for trip in trips {
        // Date strings are YYYY-MM-DD; the month key is the first 7 chars
        let key = if trip.date.len() >= 7 {
            trip.date[..7].to_string()
        } else {
            trip.date.clone()
        };
        match months.iter_mut().find(|m| m.month == key) {
            Some(month) => {
                month.trip_count += 1;
                month.distance += trip.distance;
            }
            None => months.push(MonthlyMileage {
                month: key,
                trip_count: 1,
                distance: trip.distance,
            }),
        }
    }
    months.sort_by(|a, b| a.month.cmp(&b.month));
    months
}
