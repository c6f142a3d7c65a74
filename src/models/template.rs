use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A saved route/stop pair for starting a trip in one click.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripTemplate {
    pub id: String,
    pub user_id: i64,
    pub label: String,
    pub route: String,
    pub start_stop: String,
    pub created_at: DateTime<Utc>,
}
