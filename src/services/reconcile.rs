//! The admin inbox: free-text stop names riders typed that the stop library
//! does not know yet, and linking them to canonical stops.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        stop::{NewStop, Stop},
        trip::Trip,
    },
    services::stops::{fetch_stop, insert_alias, insert_stop, StopIndex},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedStop {
    pub value: String,
    pub count: usize,
}

/// Tallies start/end stop strings the index cannot resolve, most frequent first.
pub fn scan_unmatched(trips: &[Trip], index: &StopIndex) -> Vec<UnmatchedStop> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let values = trips.iter().flat_map(|trip| {
        std::iter::once(trip.start_stop.as_str()).chain(trip.end_stop.as_deref())
    });
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }

    let mut queue: Vec<UnmatchedStop> = counts
        .into_iter()
        .filter(|(value, _)| index.resolve(value).is_none())
        .map(|(value, count)| UnmatchedStop {
            value: value.to_string(),
            count,
        })
        .collect();
    queue.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    queue
}

#[derive(Clone)]
pub struct Reconciler {
    db: DbPool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkOutcome {
    pub start_updates: u64,
    pub end_updates: u64,
}

impl LinkOutcome {
    pub fn total(&self) -> u64 {
        self.start_updates + self.end_updates
    }
}

impl Reconciler {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Records `value` as an alias of `stop_id` and rewrites the user's trips
    /// that used exactly that text with the canonical stop.
    ///
    /// Alias and trip updates commit together or not at all.
    pub async fn link_value(
        &self,
        user_id: i64,
        value: &str,
        stop_id: &str,
    ) -> Result<LinkOutcome, AppError> {
        let value = linkable(value)?;
        let mut tx = self.db.begin().await?;
        let (_, outcome) = link_in(&mut tx, user_id, value, stop_id)
            .await
            .map_err(|err| {
                warn!(user_id, value, stop_id, "linking failed, nothing stored: {err}");
                err
            })?;
        tx.commit().await?;
        info!(
            user_id,
            value,
            stop_id,
            start_updates = outcome.start_updates,
            end_updates = outcome.end_updates,
            "stop alias linked"
        );
        Ok(outcome)
    }

    /// Creates the stop and links `value` to it in one transaction.
    pub async fn create_and_link(
        &self,
        user_id: i64,
        value: &str,
        new: NewStop,
    ) -> Result<(Stop, LinkOutcome), AppError> {
        let value = linkable(value)?;
        let mut tx = self.db.begin().await?;
        let linked = async {
            let stop_id = insert_stop(&mut tx, new).await?;
            link_in(&mut tx, user_id, value, &stop_id).await
        }
        .await;
        let (stop, outcome) = linked.map_err(|err| {
            warn!(user_id, value, "creating stop failed, nothing stored: {err}");
            err
        })?;
        tx.commit().await?;
        info!(
            user_id,
            value,
            stop_id = %stop.id,
            start_updates = outcome.start_updates,
            end_updates = outcome.end_updates,
            "stop created from inbox"
        );
        Ok((stop, outcome))
    }
}

fn linkable(value: &str) -> Result<&str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest("Nothing to link.".into()));
    }
    Ok(value)
}

async fn link_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    value: &str,
    stop_id: &str,
) -> Result<(Stop, LinkOutcome), AppError> {
    insert_alias(&mut *conn, stop_id, value).await?;
    let stop = fetch_stop(&mut *conn, stop_id).await?;

    let start_updates = sqlx::query(
        r#"UPDATE trips SET start_stop_name = ?1, start_stop_code = ?2, start_stop_id = ?3,
               boarding_lat = COALESCE(boarding_lat, ?4), boarding_lng = COALESCE(boarding_lng, ?5)
           WHERE user_id = ?6 AND TRIM(start_stop) = ?7"#,
    )
    .bind(&stop.name)
    .bind(&stop.code)
    .bind(&stop.id)
    .bind(stop.lat)
    .bind(stop.lng)
    .bind(user_id)
    .bind(value)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let end_updates = sqlx::query(
        r#"UPDATE trips SET end_stop_name = ?1, end_stop_code = ?2, end_stop_id = ?3,
               exit_lat = COALESCE(exit_lat, ?4), exit_lng = COALESCE(exit_lng, ?5)
           WHERE user_id = ?6 AND end_stop IS NOT NULL AND TRIM(end_stop) = ?7"#,
    )
    .bind(&stop.name)
    .bind(&stop.code)
    .bind(&stop.id)
    .bind(stop.lat)
    .bind(stop.lng)
    .bind(user_id)
    .bind(value)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query(
        r#"UPDATE trips SET verified = (start_stop_id IS NOT NULL
               AND (end_stop IS NULL OR end_stop_id IS NOT NULL))
           WHERE user_id = ?1 AND (start_stop_id = ?2 OR end_stop_id = ?2)"#,
    )
    .bind(user_id)
    .bind(&stop.id)
    .execute(&mut *conn)
    .await?;

    Ok((
        stop,
        LinkOutcome {
            start_updates,
            end_updates,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TripSource;
    use chrono::Utc;

    fn trip(start: &str, end: Option<&str>) -> Trip {
        Trip {
            id: start.into(),
            user_id: 7,
            route: "504".into(),
            start_stop: start.into(),
            start_stop_name: None,
            start_stop_code: None,
            start_stop_id: None,
            end_stop: end.map(Into::into),
            end_stop_name: None,
            end_stop_code: None,
            end_stop_id: None,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            boarding_lat: None,
            boarding_lng: None,
            exit_lat: None,
            exit_lng: None,
            verified: false,
            source: TripSource::Web,
        }
    }

    fn library() -> StopIndex {
        StopIndex::new(vec![Stop {
            id: "union".into(),
            name: "Union Station".into(),
            code: Some("14260".into()),
            agency: "TTC".into(),
            direction: None,
            lat: Some(43.645),
            lng: Some(-79.380),
            aliases: vec!["union".into()],
        }])
    }

    #[test]
    fn queue_is_sorted_by_frequency_and_skips_known_stops() {
        let trips = vec![
            trip("King & Spadina", Some("union")),
            trip(" King & Spadina ", Some("Dundas West")),
            trip("Dundas West", Some("King & Spadina")),
            trip("14260", Some("Queen St")),
            trip("Union Station", None),
        ];
        let queue = scan_unmatched(&trips, &library());
        assert_eq!(
            queue,
            vec![
                UnmatchedStop { value: "King & Spadina".into(), count: 3 },
                UnmatchedStop { value: "Dundas West".into(), count: 2 },
                UnmatchedStop { value: "Queen St".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn blank_entries_are_ignored() {
        let trips = vec![trip("   ", Some(""))];
        assert!(scan_unmatched(&trips, &StopIndex::default()).is_empty());
    }
}
