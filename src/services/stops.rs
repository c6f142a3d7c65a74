use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::stop::{NewStop, Stop, StopRow},
};

#[derive(Clone)]
pub struct StopLibrary {
    db: DbPool,
}

impl StopLibrary {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Stop>, AppError> {
        let rows: Vec<StopRow> = sqlx::query_as(
            "SELECT id, name, code, agency, direction, lat, lng FROM stops ORDER BY name, code",
        )
        .fetch_all(&self.db)
        .await?;

        let alias_rows = sqlx::query("SELECT stop_id, alias FROM stop_aliases ORDER BY alias")
            .fetch_all(&self.db)
            .await?;
        let mut aliases: HashMap<String, Vec<String>> = HashMap::new();
        for row in alias_rows {
            aliases
                .entry(row.get("stop_id"))
                .or_default()
                .push(row.get("alias"));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let stop_aliases = aliases.remove(&row.id).unwrap_or_default();
                row.with_aliases(stop_aliases)
            })
            .collect())
    }

    pub async fn get(&self, stop_id: &str) -> Result<Stop, AppError> {
        let mut conn = self.db.acquire().await?;
        fetch_stop(&mut conn, stop_id).await
    }

    pub async fn create(&self, new: NewStop) -> Result<Stop, AppError> {
        let mut conn = self.db.acquire().await?;
        let id = insert_stop(&mut conn, new).await?;
        fetch_stop(&mut conn, &id).await
    }

    /// Records `alias` for the stop; values the stop already answers to are skipped.
    pub async fn add_alias(&self, stop_id: &str, alias: &str) -> Result<Stop, AppError> {
        let mut conn = self.db.acquire().await?;
        insert_alias(&mut conn, stop_id, alias).await?;
        fetch_stop(&mut conn, stop_id).await
    }

    pub async fn remove_alias(&self, stop_id: &str, alias: &str) -> Result<Stop, AppError> {
        sqlx::query("DELETE FROM stop_aliases WHERE stop_id = ?1 AND alias = ?2")
            .bind(stop_id)
            .bind(alias)
            .execute(&self.db)
            .await?;
        self.get(stop_id).await
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM stops")
            .fetch_one(&self.db)
            .await?)
    }

    pub async fn index(&self) -> Result<StopIndex, AppError> {
        Ok(StopIndex::new(self.list().await?))
    }
}

/// Exact-match lookup of free text against stop names, codes and aliases.
///
/// Names win over codes, codes over aliases, and among equals the first
/// stop in library order wins.
#[derive(Debug, Default)]
pub struct StopIndex {
    stops: Vec<Stop>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl StopIndex {
    pub fn new(stops: Vec<Stop>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_code = HashMap::new();
        let mut by_alias = HashMap::new();
        for (idx, stop) in stops.iter().enumerate() {
            by_name.entry(stop.name.clone()).or_insert(idx);
            if let Some(code) = &stop.code {
                by_code.entry(code.clone()).or_insert(idx);
            }
            for alias in &stop.aliases {
                by_alias.entry(alias.clone()).or_insert(idx);
            }
        }
        Self {
            stops,
            by_name,
            by_code,
            by_alias,
        }
    }

    pub fn resolve(&self, value: &str) -> Option<&Stop> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        self.by_name
            .get(value)
            .or_else(|| self.by_code.get(value))
            .or_else(|| self.by_alias.get(value))
            .map(|&idx| &self.stops[idx])
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }
}

pub(crate) async fn fetch_stop(
    conn: &mut SqliteConnection,
    stop_id: &str,
) -> Result<Stop, AppError> {
    let row: Option<StopRow> = sqlx::query_as(
        "SELECT id, name, code, agency, direction, lat, lng FROM stops WHERE id = ?1",
    )
    .bind(stop_id)
    .fetch_optional(&mut *conn)
    .await?;
    let row = row.ok_or(AppError::NotFound)?;
    let aliases: Vec<String> =
        sqlx::query_scalar("SELECT alias FROM stop_aliases WHERE stop_id = ?1 ORDER BY alias")
            .bind(stop_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(row.with_aliases(aliases))
}

/// Inserts a stop and returns its new id.
pub(crate) async fn insert_stop(
    conn: &mut SqliteConnection,
    new: NewStop,
) -> Result<String, AppError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("A stop needs a name.".into()));
    }
    let code = trimmed(new.code);
    let direction = trimmed(new.direction);
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO stops (id, name, code, agency, direction, lat, lng, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
    )
    .bind(&id)
    .bind(name)
    .bind(&code)
    .bind(new.agency.trim())
    .bind(&direction)
    .bind(new.lat)
    .bind(new.lng)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    info!(stop_id = %id, name, "stop created");
    Ok(id)
}

/// Adds `alias` to the stop unless it already answers to it.
pub(crate) async fn insert_alias(
    conn: &mut SqliteConnection,
    stop_id: &str,
    alias: &str,
) -> Result<(), AppError> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(AppError::BadRequest("An alias cannot be empty.".into()));
    }
    if fetch_stop(&mut *conn, stop_id).await?.answers_to(alias) {
        return Ok(());
    }
    sqlx::query("INSERT OR IGNORE INTO stop_aliases (stop_id, alias) VALUES (?1, ?2)")
        .bind(stop_id)
        .bind(alias)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, name: &str, code: Option<&str>, aliases: &[&str]) -> Stop {
        Stop {
            id: id.into(),
            name: name.into(),
            code: code.map(Into::into),
            agency: "TTC".into(),
            direction: None,
            lat: None,
            lng: None,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn resolves_by_name_code_and_alias() {
        let index = StopIndex::new(vec![
            stop("a", "King St West", Some("6036"), &["king w"]),
            stop("b", "Union Station", None, &["union"]),
        ]);
        assert_eq!(index.resolve("King St West").map(|s| s.id.as_str()), Some("a"));
        assert_eq!(index.resolve("6036").map(|s| s.id.as_str()), Some("a"));
        assert_eq!(index.resolve("  union ").map(|s| s.id.as_str()), Some("b"));
        assert!(index.resolve("Union").is_none());
        assert!(index.resolve("").is_none());
    }

    #[test]
    fn names_take_precedence_over_aliases() {
        let index = StopIndex::new(vec![
            stop("a", "Queen", None, &["Spadina"]),
            stop("b", "Spadina", None, &[]),
        ]);
        assert_eq!(index.resolve("Spadina").map(|s| s.id.as_str()), Some("b"));
    }
}
