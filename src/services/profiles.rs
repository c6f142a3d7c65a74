use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        profile::{normalize_phone, Profile},
        user::User,
    },
};

const PROFILE_COLUMNS: &str =
    "user_id, name, emoji, default_agency, is_public, sms_phone, sms_confirmed";

#[derive(Clone)]
pub struct ProfileStore {
    db: DbPool,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub emoji: String,
    pub default_agency: String,
    pub is_public: bool,
    pub sms_phone: Option<String>,
}

impl ProfileStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// The stored profile, or an empty one for users who never saved theirs.
    pub async fn get(&self, user_id: i64) -> Result<Profile, AppError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
        let profile: Option<Profile> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(profile.unwrap_or_else(|| Profile::empty(user_id)))
    }

    pub async fn save(&self, user_id: i64, update: ProfileUpdate) -> Result<Profile, AppError> {
        let current = self.get(user_id).await?;
        let sms_phone = match update.sms_phone.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_phone(raw).ok_or_else(|| {
                AppError::BadRequest("That phone number does not look right.".into())
            })?),
        };
        if let Some(phone) = &sms_phone {
            if let Some(other) = self.find_by_phone(phone).await? {
                if other.user_id != user_id {
                    return Err(AppError::BadRequest(
                        "That phone number belongs to another account.".into(),
                    ));
                }
            }
        }
        // A new number has to be confirmed again by texting REGISTER.
        let sms_confirmed = current.sms_confirmed && current.sms_phone == sms_phone;

        sqlx::query(
            r#"INSERT INTO profiles (user_id, name, emoji, default_agency, is_public, sms_phone, sms_confirmed)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(user_id) DO UPDATE SET name = excluded.name, emoji = excluded.emoji,
                   default_agency = excluded.default_agency, is_public = excluded.is_public,
                   sms_phone = excluded.sms_phone, sms_confirmed = excluded.sms_confirmed"#,
        )
        .bind(user_id)
        .bind(update.name.trim())
        .bind(update.emoji.trim())
        .bind(update.default_agency.trim())
        .bind(update.is_public)
        .bind(&sms_phone)
        .bind(sms_confirmed)
        .execute(&self.db)
        .await?;
        debug!(user_id, "profile saved");
        self.get(user_id).await
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Profile>, AppError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE sms_phone = ?1");
        Ok(sqlx::query_as(&sql)
            .bind(phone)
            .fetch_optional(&self.db)
            .await?)
    }

    pub async fn confirm_sms(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE profiles SET sms_confirmed = 1 WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Resolves `username` to its user and profile when the profile is public.
    pub async fn find_public(&self, username: &str) -> Result<(User, Profile), AppError> {
        let user: Option<User> = sqlx::query_as(
            r#"SELECT id, uuid, username, email, password_hash, role, created_at, last_login_at
               FROM users WHERE username = ?1"#,
        )
        .bind(username.trim())
        .fetch_optional(&self.db)
        .await?;
        let user = user.ok_or(AppError::NotFound)?;
        let profile = self.get(user.id).await?;
        if !profile.is_public {
            return Err(AppError::NotFound);
        }
        Ok((user, profile))
    }
}
