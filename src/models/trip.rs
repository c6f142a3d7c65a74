use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TripSource {
    #[default]
    Web,
    Sms,
}

impl TripSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripSource::Web => "web",
            TripSource::Sms => "sms",
        }
    }
}

impl fmt::Display for TripSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: String,
    pub user_id: i64,
    pub route: String,
    pub start_stop: String,
    pub start_stop_name: Option<String>,
    pub start_stop_code: Option<String>,
    pub start_stop_id: Option<String>,
    /// `None` while the trip is still running.
    pub end_stop: Option<String>,
    pub end_stop_name: Option<String>,
    pub end_stop_code: Option<String>,
    pub end_stop_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes between start and end.
    pub duration: Option<i64>,
    pub boarding_lat: Option<f64>,
    pub boarding_lng: Option<f64>,
    pub exit_lat: Option<f64>,
    pub exit_lng: Option<f64>,
    pub verified: bool,
    pub source: TripSource,
}

impl Trip {
    pub fn is_active(&self) -> bool {
        self.end_stop.is_none()
    }

    /// Canonical start stop label, falling back to what the rider typed.
    pub fn start_label(&self) -> &str {
        self.start_stop_name
            .as_deref()
            .or(self.start_stop_code.as_deref())
            .unwrap_or(self.start_stop.trim())
    }

    pub fn end_label(&self) -> Option<&str> {
        let raw = self.end_stop.as_deref()?;
        Some(
            self.end_stop_name
                .as_deref()
                .or(self.end_stop_code.as_deref())
                .unwrap_or(raw.trim()),
        )
    }

    pub fn boarding_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.boarding_lat, self.boarding_lng)
    }

    pub fn exit_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.exit_lat, self.exit_lng)
    }

    pub fn local_date(&self) -> NaiveDate {
        self.start_time.with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTrip {
    pub route: String,
    pub start_stop: String,
    pub boarding: Option<GeoPoint>,
    pub source: TripSource,
}

#[derive(Debug, Clone, Default)]
pub struct EndTrip {
    pub end_stop: String,
    pub exit: Option<GeoPoint>,
}

/// Whole minutes between two instants, rounded to the nearest minute.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds().max(0);
    (seconds + 30) / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_rounds_to_nearest_minute() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(duration_minutes(start, start + chrono::Duration::seconds(89)), 1);
        assert_eq!(duration_minutes(start, start + chrono::Duration::seconds(90)), 2);
        assert_eq!(duration_minutes(start, start - chrono::Duration::minutes(5)), 0);
    }

    #[test]
    fn geo_point_requires_both_coordinates() {
        assert!(GeoPoint::from_parts(Some(43.6), None).is_none());
        assert!(GeoPoint::from_parts(Some(f64::NAN), Some(-79.3)).is_none());
        assert_eq!(
            GeoPoint::from_parts(Some(43.6), Some(-79.3)),
            Some(GeoPoint { lat: 43.6, lng: -79.3 })
        );
    }
}
