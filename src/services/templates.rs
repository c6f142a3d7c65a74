use chrono::Utc;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::template::TripTemplate};

#[derive(Clone)]
pub struct TemplateStore {
    db: DbPool,
}

impl TemplateStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<TripTemplate>, AppError> {
        Ok(sqlx::query_as(
            r#"SELECT id, user_id, label, route, start_stop, created_at
               FROM templates WHERE user_id = ?1 ORDER BY label"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn get(&self, user_id: i64, template_id: &str) -> Result<TripTemplate, AppError> {
        sqlx::query_as(
            r#"SELECT id, user_id, label, route, start_stop, created_at
               FROM templates WHERE id = ?1 AND user_id = ?2"#,
        )
        .bind(template_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn create(
        &self,
        user_id: i64,
        label: Option<&str>,
        route: &str,
        start_stop: &str,
    ) -> Result<TripTemplate, AppError> {
        let route = route.trim();
        let start_stop = start_stop.trim();
        if route.is_empty() || start_stop.is_empty() {
            return Err(AppError::BadRequest(
                "A template needs a route and a stop.".into(),
            ));
        }
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{route} from {start_stop}"));
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO templates (id, user_id, label, route, start_stop, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&label)
        .bind(route)
        .bind(start_stop)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        self.get(user_id, &id).await
    }

    pub async fn delete(&self, user_id: i64, template_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = ?1 AND user_id = ?2")
            .bind(template_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
