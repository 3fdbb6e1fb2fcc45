//! Travel statistics
//!
//! Aggregates a canonical point/path set into distance totals, time
//! breakdowns, place frequency, activity distribution, and calendar rollups.
//! Distance is computed both from the point stream and from the paths, and
//! the larger of the two is reported: paths typically under-report because
//! not every raw fix belongs to a classified segment.

use crate::geomath::haversine_distance;
use crate::types::{Point, PointKind, TrackPath};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Tuning knobs for the stats walk. A single hop at or beyond
/// `max_jump_meters` (default 500 km) is treated as a GPS glitch and excluded
/// from every distance sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOptions {
    pub max_jump_meters: f64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        StatsOptions {
            max_jump_meters: 500_000.0,
        }
    }
}

/// Visit frequency of one named place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCount {
    pub name: String,
    pub visits: usize,
}

/// Per-activity rollup over paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathActivity {
    pub activity_type: String,
    pub count: usize,
    pub distance_meters: f64,
    pub duration_seconds: i64,
}

/// Per-activity fix count over points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointActivity {
    pub activity_type: String,
    pub count: usize,
}

/// Month bucket inside a yearly rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthCount {
    pub month: String,
    pub points: usize,
}

/// Calendar-year rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyRollup {
    pub year: i32,
    pub point_count: usize,
    pub months: Vec<MonthCount>,
    pub distance_meters: f64,
}

/// Aggregate travel statistics over one canonical data set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TravelStats {
    /// max(point walk, path sum)
    pub total_distance_meters: f64,
    pub point_distance_meters: f64,
    pub path_distance_meters: f64,
    /// Dwell time over place visits with both timestamps
    pub stationary_seconds: i64,
    /// Movement time over paths with both timestamps
    pub traveling_seconds: i64,
    pub top_places: Vec<PlaceCount>,
    pub path_activities: Vec<PathActivity>,
    pub point_activities: Vec<PointActivity>,
    pub yearly: Vec<YearlyRollup>,
}

/// Compute travel statistics from points and paths.
pub fn calculate_travel_stats(
    points: &[Point],
    paths: &[TrackPath],
    options: &StatsOptions,
) -> TravelStats {
    let sorted = time_sorted(points);

    let point_distance_meters = point_walk_distance(&sorted, options, None);
    let path_distance_meters = paths.iter().map(path_distance).sum::<f64>();

    let mut stats = TravelStats {
        total_distance_meters: point_distance_meters.max(path_distance_meters),
        point_distance_meters,
        path_distance_meters,
        stationary_seconds: stationary_time(points),
        traveling_seconds: traveling_time(paths),
        top_places: top_places(points),
        path_activities: path_activities(paths),
        point_activities: point_activities(points),
        yearly: Vec::new(),
    };
    stats.yearly = yearly_rollups(&sorted, options);
    stats
}

/// Distance of one path: the precomputed value when present, otherwise
/// Haversine over its coordinate list.
pub fn path_distance(path: &TrackPath) -> f64 {
    if let Some(distance) = path.distance_meters {
        return distance;
    }
    path.coordinates
        .windows(2)
        .map(|pair| haversine_distance(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng))
        .sum()
}

fn time_sorted(points: &[Point]) -> Vec<&Point> {
    let mut sorted: Vec<&Point> = points.iter().collect();
    sorted.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted
}

/// Walk consecutive sorted points summing Haversine hops below the glitch
/// threshold. With `per_year` set, each hop is attributed to the year of its
/// later point.
fn point_walk_distance(
    sorted: &[&Point],
    options: &StatsOptions,
    mut per_year: Option<&mut std::collections::BTreeMap<i32, f64>>,
) -> f64 {
    let mut total = 0.0;
    for pair in sorted.windows(2) {
        let hop = haversine_distance(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng);
        if hop >= options.max_jump_meters {
            continue;
        }
        total += hop;
        if let Some(buckets) = per_year.as_deref_mut() {
            if let Some(ts) = pair[1].timestamp {
                *buckets.entry(ts.year()).or_insert(0.0) += hop;
            }
        }
    }
    total
}

fn stationary_time(points: &[Point]) -> i64 {
    points
        .iter()
        .filter(|p| p.kind == PointKind::PlaceVisit)
        .filter_map(|p| match (p.timestamp, p.end_timestamp) {
            (Some(arrived), Some(departed)) => Some((departed - arrived).num_seconds().max(0)),
            _ => None,
        })
        .sum()
}

fn traveling_time(paths: &[TrackPath]) -> i64 {
    paths
        .iter()
        .filter_map(|p| match (p.start_timestamp, p.end_timestamp) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        })
        .sum()
}

/// Group place visits by name (falling back to address) and rank by visit
/// count descending; ties keep encounter order.
fn top_places(points: &[Point]) -> Vec<PlaceCount> {
    let mut places: Vec<PlaceCount> = Vec::new();
    for point in points.iter().filter(|p| p.kind == PointKind::PlaceVisit) {
        let Some(label) = point.name.as_deref().or(point.address.as_deref()) else {
            continue;
        };
        match places.iter_mut().find(|p| p.name == label) {
            Some(entry) => entry.visits += 1,
            None => places.push(PlaceCount {
                name: label.to_string(),
                visits: 1,
            }),
        }
    }
    places.sort_by(|a, b| b.visits.cmp(&a.visits));
    places
}

fn path_activities(paths: &[TrackPath]) -> Vec<PathActivity> {
    let mut activities: Vec<PathActivity> = Vec::new();
    for path in paths {
        let Some(kind) = path.activity_type.as_deref() else { continue };
        let distance = path_distance(path);
        let duration = match (path.start_timestamp, path.end_timestamp) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            _ => 0,
        };
        match activities.iter_mut().find(|a| a.activity_type == kind) {
            Some(entry) => {
                entry.count += 1;
                entry.distance_meters += distance;
                entry.duration_seconds += duration;
            }
            None => activities.push(PathActivity {
                activity_type: kind.to_string(),
                count: 1,
                distance_meters: distance,
                duration_seconds: duration,
            }),
        }
    }
    activities
}

/// Points carrying a per-point activity represent raw fixes, not segments;
/// only their count is tallied.
fn point_activities(points: &[Point]) -> Vec<PointActivity> {
    let mut activities: Vec<PointActivity> = Vec::new();
    for point in points {
        let Some(kind) = point.activity_type.as_deref() else { continue };
        match activities.iter_mut().find(|a| a.activity_type == kind) {
            Some(entry) => entry.count += 1,
            None => activities.push(PointActivity {
                activity_type: kind.to_string(),
                count: 1,
            }),
        }
    }
    activities
}

fn yearly_rollups(sorted: &[&Point], options: &StatsOptions) -> Vec<YearlyRollup> {
    use std::collections::BTreeMap;

    let mut counts: BTreeMap<i32, (usize, [usize; 12])> = BTreeMap::new();
    for point in sorted {
        let Some(ts) = point.timestamp else { continue };
        let entry = counts.entry(ts.year()).or_insert((0, [0; 12]));
        entry.0 += 1;
        entry.1[ts.month0() as usize] += 1;
    }

    let mut distances: BTreeMap<i32, f64> = BTreeMap::new();
    point_walk_distance(sorted, options, Some(&mut distances));

    counts
        .into_iter()
        .map(|(year, (point_count, month_counts))| YearlyRollup {
            year,
            point_count,
            months: month_counts
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(index, &count)| MonthCount {
                    month: MONTH_NAMES[index].to_string(),
                    points: count,
                })
                .collect(),
            distance_meters: distances.get(&year).copied().unwrap_or(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use chrono::{DateTime, Utc};

    fn timed_point(lat: f64, lng: f64, ts: &str) -> Point {
        let mut p = Point::new(lat, lng, PointKind::RawFix);
        p.timestamp = Some(ts.parse::<DateTime<Utc>>().unwrap());
        p
    }

    fn visit(name: &str, start: &str, end: &str) -> Point {
        let mut p = Point::new(52.52, 13.405, PointKind::PlaceVisit);
        p.name = Some(name.to_string());
        p.timestamp = Some(start.parse::<DateTime<Utc>>().unwrap());
        p.end_timestamp = Some(end.parse::<DateTime<Utc>>().unwrap());
        p
    }

    #[test]
    fn test_jump_filter_excludes_glitches() {
        // ~600 km hop followed by a ~10 km hop
        let points = vec![
            timed_point(52.52, 13.405, "2024-01-15T08:00:00Z"),
            timed_point(47.37, 8.54, "2024-01-15T08:00:05Z"),
            timed_point(47.28, 8.54, "2024-01-15T08:30:00Z"),
        ];

        let stats = calculate_travel_stats(&points, &[], &StatsOptions::default());
        // Only the short hop counts, within 1%
        assert!((stats.point_distance_meters - 10_000.0).abs() < 100.0,
            "got {}", stats.point_distance_meters);
    }

    #[test]
    fn test_ten_km_hop_measures_ten_km() {
        // 0.09 degrees of latitude is very close to 10 km
        let points = vec![
            timed_point(47.37, 8.54, "2024-01-15T08:00:00Z"),
            timed_point(47.28, 8.54, "2024-01-15T08:30:00Z"),
        ];
        let stats = calculate_travel_stats(&points, &[], &StatsOptions::default());
        assert!((stats.point_distance_meters - 10_000.0).abs() / 10_000.0 < 0.01);
    }

    #[test]
    fn test_total_is_max_of_point_and_path_distance() {
        let points = vec![
            timed_point(52.52, 13.405, "2024-01-15T08:00:00Z"),
            timed_point(52.53, 13.405, "2024-01-15T08:10:00Z"),
        ];
        let mut path = TrackPath::new(vec![
            Coordinate::new(52.52, 13.405),
            Coordinate::new(52.53, 13.405),
        ]);
        path.distance_meters = Some(25_000.0);

        let stats = calculate_travel_stats(&points, &[path], &StatsOptions::default());
        assert_eq!(stats.total_distance_meters, 25_000.0);
        assert!(stats.point_distance_meters < 2_000.0);
    }

    #[test]
    fn test_path_distance_prefers_precomputed() {
        let mut path = TrackPath::new(vec![
            Coordinate::new(52.52, 13.405),
            Coordinate::new(52.53, 13.405),
        ]);
        assert!(path_distance(&path) > 1_000.0);
        path.distance_meters = Some(42.0);
        assert_eq!(path_distance(&path), 42.0);
    }

    #[test]
    fn test_time_breakdown_is_independent_sums() {
        let points = vec![
            visit("Home", "2024-01-15T08:00:00Z", "2024-01-15T09:00:00Z"),
            visit("Office", "2024-01-15T10:00:00Z", "2024-01-15T16:00:00Z"),
        ];
        let mut path = TrackPath::new(vec![
            Coordinate::new(52.52, 13.405),
            Coordinate::new(52.53, 13.415),
        ]);
        path.start_timestamp = Some("2024-01-15T09:00:00Z".parse().unwrap());
        path.end_timestamp = Some("2024-01-15T09:30:00Z".parse().unwrap());

        let stats = calculate_travel_stats(&points, &[path], &StatsOptions::default());
        assert_eq!(stats.stationary_seconds, 7 * 3600);
        assert_eq!(stats.traveling_seconds, 1800);
    }

    #[test]
    fn test_top_places_ranking_and_ties() {
        let points = vec![
            visit("Office", "2024-01-15T08:00:00Z", "2024-01-15T09:00:00Z"),
            visit("Home", "2024-01-15T18:00:00Z", "2024-01-15T19:00:00Z"),
            visit("Office", "2024-01-16T08:00:00Z", "2024-01-16T09:00:00Z"),
            visit("Gym", "2024-01-16T18:00:00Z", "2024-01-16T19:00:00Z"),
        ];

        let stats = calculate_travel_stats(&points, &[], &StatsOptions::default());
        assert_eq!(stats.top_places[0].name, "Office");
        assert_eq!(stats.top_places[0].visits, 2);
        // Home and Gym tie at 1; encounter order is preserved
        assert_eq!(stats.top_places[1].name, "Home");
        assert_eq!(stats.top_places[2].name, "Gym");
    }

    #[test]
    fn test_place_falls_back_to_address() {
        let mut p = Point::new(52.52, 13.405, PointKind::PlaceVisit);
        p.address = Some("Unter den Linden 1".to_string());
        let stats = calculate_travel_stats(&[p], &[], &StatsOptions::default());
        assert_eq!(stats.top_places[0].name, "Unter den Linden 1");
    }

    #[test]
    fn test_activity_distribution() {
        let mut walk = TrackPath::new(vec![
            Coordinate::new(52.52, 13.405),
            Coordinate::new(52.53, 13.415),
        ]);
        walk.activity_type = Some("WALKING".to_string());
        walk.distance_meters = Some(1_500.0);
        let mut drive = TrackPath::new(vec![
            Coordinate::new(52.52, 13.405),
            Coordinate::new(52.60, 13.50),
        ]);
        drive.activity_type = Some("IN_PASSENGER_VEHICLE".to_string());
        drive.distance_meters = Some(12_000.0);

        let mut fix = Point::new(52.52, 13.405, PointKind::RawFix);
        fix.activity_type = Some("STILL".to_string());

        let stats = calculate_travel_stats(&[fix], &[walk, drive], &StatsOptions::default());
        assert_eq!(stats.path_activities.len(), 2);
        let walking = stats
            .path_activities
            .iter()
            .find(|a| a.activity_type == "WALKING")
            .unwrap();
        assert_eq!(walking.count, 1);
        assert_eq!(walking.distance_meters, 1_500.0);

        assert_eq!(stats.point_activities.len(), 1);
        assert_eq!(stats.point_activities[0].activity_type, "STILL");
    }

    #[test]
    fn test_yearly_rollup_attributes_hop_to_later_year() {
        // Two fixes straddling New Year's Eve, ~10 km apart
        let points = vec![
            timed_point(47.37, 8.54, "2023-12-31T23:50:00Z"),
            timed_point(47.28, 8.54, "2024-01-01T00:10:00Z"),
        ];

        let stats = calculate_travel_stats(&points, &[], &StatsOptions::default());
        assert_eq!(stats.yearly.len(), 2);

        let y2023 = stats.yearly.iter().find(|y| y.year == 2023).unwrap();
        let y2024 = stats.yearly.iter().find(|y| y.year == 2024).unwrap();
        assert_eq!(y2023.point_count, 1);
        assert_eq!(y2023.distance_meters, 0.0);
        assert!((y2024.distance_meters - 10_000.0).abs() < 100.0);
        assert_eq!(y2024.months[0].month, "January");
    }
}
