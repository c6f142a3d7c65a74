//! Reductions over a rider's trip log: totals, top lists and day streaks.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::trip::Trip;

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub current: u32,
    pub best: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TripStats {
    pub total_trips: usize,
    pub unique_routes: usize,
    pub unique_stops: usize,
    pub total_minutes: i64,
    pub top_routes: Vec<RankedCount>,
    pub top_stops: Vec<RankedCount>,
    pub streak: Streak,
}

impl TripStats {
    pub fn from_trips(trips: &[Trip], today: NaiveDate, top_n: usize) -> Self {
        let mut routes: HashMap<&str, usize> = HashMap::new();
        let mut stops: HashMap<&str, usize> = HashMap::new();
        let mut total_minutes = 0;

        for trip in trips {
            let route = trip.route.trim();
            if !route.is_empty() {
                *routes.entry(route).or_default() += 1;
            }
            let start = trip.start_label();
            if !start.is_empty() {
                *stops.entry(start).or_default() += 1;
            }
            if let Some(end) = trip.end_label().filter(|label| !label.is_empty()) {
                *stops.entry(end).or_default() += 1;
            }
            total_minutes += trip.duration.unwrap_or(0).max(0);
        }

        let days: Vec<NaiveDate> = trips.iter().map(Trip::local_date).collect();

        Self {
            total_trips: trips.len(),
            unique_routes: routes.len(),
            unique_stops: stops.len(),
            total_minutes,
            top_routes: top_counts(routes, top_n),
            top_stops: top_counts(stops, top_n),
            streak: streak(&days, today),
        }
    }

    /// "3h 25m" style total for display.
    pub fn total_time_text(&self) -> String {
        let hours = self.total_minutes / 60;
        let minutes = self.total_minutes % 60;
        if hours > 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{minutes}m")
        }
    }
}

/// Highest counts first; equal counts ordered by label.
pub fn top_counts(counts: HashMap<&str, usize>, top_n: usize) -> Vec<RankedCount> {
    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(label, count)| RankedCount {
            label: label.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    ranked.truncate(top_n);
    ranked
}

/// Consecutive calendar days with at least one trip.
///
/// `current` only counts a run whose last day is `today` or the day before.
pub fn streak(days: &[NaiveDate], today: NaiveDate) -> Streak {
    let unique: BTreeSet<NaiveDate> = days.iter().copied().filter(|d| *d <= today).collect();
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for day in &unique {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(*day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(*day);
    }

    let current = match previous {
        Some(last) if last == today || last.succ_opt() == Some(today) => run,
        _ => 0,
    };

    Streak { current, best }
}

pub fn distinct_days(trips: &[Trip]) -> usize {
    trips.iter().map(Trip::local_date).collect::<HashSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TripSource;
    use chrono::{TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trip(route: &str, start: &str, end: Option<&str>, duration: Option<i64>) -> Trip {
        Trip {
            id: format!("{route}-{start}"),
            user_id: 1,
            route: route.into(),
            start_stop: start.into(),
            start_stop_name: None,
            start_stop_code: None,
            start_stop_id: None,
            end_stop: end.map(Into::into),
            end_stop_name: None,
            end_stop_code: None,
            end_stop_id: None,
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            end_time: None,
            duration,
            boarding_lat: None,
            boarding_lng: None,
            exit_lat: None,
            exit_lng: None,
            verified: false,
            source: TripSource::Web,
        }
    }

    #[test]
    fn consecutive_days_ending_today_count_as_current() {
        let today = day(2024, 5, 10);
        let days = [day(2024, 5, 8), day(2024, 5, 9), day(2024, 5, 10), day(2024, 5, 10)];
        assert_eq!(streak(&days, today), Streak { current: 3, best: 3 });
    }

    #[test]
    fn run_ending_yesterday_is_still_current() {
        let today = day(2024, 5, 10);
        let days = [day(2024, 5, 8), day(2024, 5, 9)];
        assert_eq!(streak(&days, today).current, 2);
    }

    #[test]
    fn gap_resets_current_but_keeps_best() {
        let today = day(2024, 5, 10);
        let days = [
            day(2024, 5, 1),
            day(2024, 5, 2),
            day(2024, 5, 3),
            day(2024, 5, 4),
            day(2024, 5, 7),
        ];
        assert_eq!(streak(&days, today), Streak { current: 0, best: 4 });
    }

    #[test]
    fn streak_crosses_month_boundaries() {
        let today = day(2024, 3, 1);
        let days = [day(2024, 2, 28), day(2024, 2, 29), day(2024, 3, 1)];
        assert_eq!(streak(&days, today), Streak { current: 3, best: 3 });
    }

    #[test]
    fn empty_log_has_no_streak() {
        assert_eq!(streak(&[], day(2024, 1, 1)), Streak::default());
    }

    #[test]
    fn totals_and_top_lists() {
        let trips = vec![
            trip("504", "King St", Some("Union"), Some(12)),
            trip("504", "King St", Some("Spadina"), Some(8)),
            trip("510", "Spadina", Some("Union"), Some(20)),
            trip("1", "Union", None, None),
        ];
        let stats = TripStats::from_trips(&trips, day(2024, 5, 1), 2);
        assert_eq!(stats.total_trips, 4);
        assert_eq!(stats.unique_routes, 3);
        assert_eq!(stats.unique_stops, 3);
        assert_eq!(stats.total_minutes, 40);
        assert_eq!(
            stats.top_routes,
            vec![
                RankedCount { label: "504".into(), count: 2 },
                RankedCount { label: "1".into(), count: 1 },
            ]
        );
        assert_eq!(stats.top_stops[0], RankedCount { label: "Union".into(), count: 3 });
        assert_eq!(stats.top_stops[1].label, "King St");
    }

    #[test]
    fn total_time_text_formats_hours() {
        let stats = TripStats {
            total_minutes: 205,
            ..TripStats::default()
        };
        assert_eq!(stats.total_time_text(), "3h 25m");
    }
}
