use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        stop::categorize_stop_value,
        trip::{duration_minutes, EndTrip, GeoPoint, NewTrip, Trip, TripSource},
    },
    services::stops::{StopIndex, StopLibrary},
};

pub(crate) const TRIP_COLUMNS: &str = "id, user_id, route, start_stop, start_stop_name, \
    start_stop_code, start_stop_id, end_stop, end_stop_name, end_stop_code, end_stop_id, \
    start_time, end_time, duration, boarding_lat, boarding_lng, exit_lat, exit_lng, verified, source";

/// How many trips the dashboard and the reconciliation scan look at.
pub const RECENT_TRIPS: i64 = 100;

#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
    stops: StopLibrary,
}

/// Stop fields derived from a free-text entry, canonical when the library knows it.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ResolvedStop {
    pub raw: String,
    pub name: Option<String>,
    pub code: Option<String>,
    pub stop_id: Option<String>,
    pub location: Option<GeoPoint>,
}

impl ResolvedStop {
    pub(crate) fn from_index(index: &StopIndex, value: &str) -> Self {
        let raw = value.trim().to_string();
        match index.resolve(&raw) {
            Some(stop) => Self {
                name: Some(stop.name.clone()),
                code: stop.code.clone(),
                stop_id: Some(stop.id.clone()),
                location: GeoPoint::from_parts(stop.lat, stop.lng),
                raw,
            },
            None => {
                let categorized = categorize_stop_value(&raw);
                Self {
                    name: categorized.name,
                    code: categorized.code,
                    raw,
                    ..Self::default()
                }
            }
        }
    }
}

impl TripStore {
    pub fn new(db: DbPool, stops: StopLibrary) -> Self {
        Self { db, stops }
    }

    pub async fn active_trip(&self, user_id: i64) -> Result<Option<Trip>, AppError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ?1 AND end_stop IS NULL \
             ORDER BY start_time DESC LIMIT 1"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?)
    }

    pub async fn get(&self, user_id: i64, trip_id: &str) -> Result<Trip, AppError> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1 AND user_id = ?2");
        sqlx::query_as(&sql)
            .bind(trip_id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn start_trip(&self, user_id: i64, new: NewTrip) -> Result<Trip, AppError> {
        let route = new.route.trim();
        if route.is_empty() {
            return Err(AppError::BadRequest("Which route are you riding?".into()));
        }
        if new.start_stop.trim().is_empty() {
            return Err(AppError::BadRequest("Where did you board?".into()));
        }
        if let Some(active) = self.active_trip(user_id).await? {
            return Err(AppError::BadRequest(format!(
                "You are still on route {} from {}. End that trip first.",
                active.route,
                active.start_label()
            )));
        }

        let index = self.stops.index().await?;
        let start = ResolvedStop::from_index(&index, &new.start_stop);
        let boarding = new.boarding.or(start.location);
        let verified = start.stop_id.is_some();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO trips (id, user_id, route, start_stop, start_stop_name, start_stop_code,
                   start_stop_id, start_time, boarding_lat, boarding_lng, verified, source)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(route)
        .bind(&start.raw)
        .bind(&start.name)
        .bind(&start.code)
        .bind(&start.stop_id)
        .bind(Utc::now())
        .bind(boarding.map(|p| p.lat))
        .bind(boarding.map(|p| p.lng))
        .bind(verified)
        .bind(new.source)
        .execute(&self.db)
        .await?;

        info!(user_id, trip_id = %id, route, source = %new.source, "trip started");
        self.get(user_id, &id).await
    }

    pub async fn end_trip(&self, user_id: i64, end: EndTrip) -> Result<Trip, AppError> {
        if end.end_stop.trim().is_empty() {
            return Err(AppError::BadRequest("Where did you get off?".into()));
        }
        let Some(active) = self.active_trip(user_id).await? else {
            return Err(AppError::BadRequest("There is no trip in progress.".into()));
        };

        let index = self.stops.index().await?;
        let stop = ResolvedStop::from_index(&index, &end.end_stop);
        let exit = end.exit.or(stop.location);
        let end_time = Utc::now();
        let duration = duration_minutes(active.start_time, end_time);
        let verified = active.start_stop_id.is_some() && stop.stop_id.is_some();

        sqlx::query(
            r#"UPDATE trips SET end_stop = ?1, end_stop_name = ?2, end_stop_code = ?3,
                   end_stop_id = ?4, end_time = ?5, duration = ?6, exit_lat = ?7, exit_lng = ?8,
                   verified = ?9
               WHERE id = ?10 AND user_id = ?11"#,
        )
        .bind(&stop.raw)
        .bind(&stop.name)
        .bind(&stop.code)
        .bind(&stop.stop_id)
        .bind(end_time)
        .bind(duration)
        .bind(exit.map(|p| p.lat))
        .bind(exit.map(|p| p.lng))
        .bind(verified)
        .bind(&active.id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        info!(user_id, trip_id = %active.id, duration, "trip ended");
        self.get(user_id, &active.id).await
    }

    /// Drops the running trip, if any. Returns whether one was removed.
    pub async fn cancel_active(&self, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM trips WHERE user_id = ?1 AND end_stop IS NULL")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_trip(&self, user_id: i64, trip_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = ?1 AND user_id = ?2")
            .bind(trip_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        debug!(user_id, trip_id, "trip deleted");
        Ok(())
    }

    pub async fn recent_trips(&self, user_id: i64, limit: i64) -> Result<Vec<Trip>, AppError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ?1 ORDER BY start_time DESC LIMIT ?2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn all_trips(&self, user_id: i64) -> Result<Vec<Trip>, AppError> {
        self.trips_between(user_id, None, None).await
    }

    /// Trips whose start time falls in `[from, to)`, newest first.
    pub async fn trips_between(
        &self,
        user_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Trip>, AppError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ?1 \
             AND (?2 IS NULL OR start_time >= ?2) AND (?3 IS NULL OR start_time < ?3) \
             ORDER BY start_time DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn unverified_trips(
        &self,
        source: TripSource,
        limit: i64,
    ) -> Result<Vec<Trip>, AppError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE verified = 0 AND source = ?1 \
             ORDER BY start_time DESC LIMIT ?2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(source)
            .bind(limit)
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn count_all(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM trips")
            .fetch_one(&self.db)
            .await?)
    }

    pub async fn count_unverified(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM trips WHERE verified = 0")
            .fetch_one(&self.db)
            .await?)
    }
}
