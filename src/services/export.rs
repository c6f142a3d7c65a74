use chrono::Local;
use csv::{QuoteStyle, WriterBuilder};

use crate::{error::AppError, models::trip::Trip};

pub const CSV_HEADER: [&str; 7] = [
    "Date",
    "Route",
    "Start Stop",
    "End Stop",
    "Duration",
    "Start Time",
    "End Time",
];

/// Renders trips as CSV, quoting only fields that need it.
pub fn trips_to_csv(trips: &[Trip]) -> Result<String, AppError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for trip in trips {
        let start = trip.start_time.with_timezone(&Local);
        let end = trip.end_time.map(|t| t.with_timezone(&Local));
        writer.write_record([
            start.format("%Y-%m-%d").to_string(),
            trip.route.clone(),
            trip.start_label().to_string(),
            trip.end_label().unwrap_or_default().to_string(),
            trip.duration.map(|d| d.to_string()).unwrap_or_default(),
            start.format("%H:%M").to_string(),
            end.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| AppError::Other(anyhow::anyhow!("flushing csv failed: {err}")))?;
    String::from_utf8(bytes).map_err(|err| AppError::Other(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TripSource;
    use chrono::{TimeZone, Utc};

    fn trip(route: &str, start: &str, end: Option<&str>) -> Trip {
        Trip {
            id: "t".into(),
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
            start_time: Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2024, 6, 3, 12, 25, 0).unwrap()),
            duration: Some(25),
            boarding_lat: None,
            boarding_lng: None,
            exit_lat: None,
            exit_lng: None,
            verified: false,
            source: TripSource::Web,
        }
    }

    #[test]
    fn header_comes_first() {
        let csv = trips_to_csv(&[]).unwrap();
        assert_eq!(
            csv,
            "Date,Route,Start Stop,End Stop,Duration,Start Time,End Time\n"
        );
    }

    #[test]
    fn commas_and_quotes_are_escaped() {
        let csv = trips_to_csv(&[trip("504", "King, Spadina", Some("The \"Loop\""))]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",504,\"King, Spadina\",\"The \"\"Loop\"\"\",25,"));
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        let csv = trips_to_csv(&[trip("504", "King St", None)]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[1], "504");
        assert_eq!(fields[2], "King St");
        assert_eq!(fields[3], "");
        assert_eq!(fields[4], "25");
    }
}
