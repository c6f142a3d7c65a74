use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::{Session, SESSION_LIFETIME_DAYS},
        user::{AllowedUser, User, UserRole},
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "tripbook_session";

const USER_COLUMNS: &str =
    "id, uuid, username, email, password_hash, role, created_at, last_login_at";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub role: UserRole,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            role: user.role(),
            id: user.id,
            uuid: user.uuid,
            username: user.username,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let state = AppState::from_ref(state);
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = lookup_session(&state, cookie.value()).await?;
        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_user()?;
        if user.role == UserRole::Admin {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(|u| u.role == UserRole::Admin)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!("stored password hash is unreadable: {err}");
            false
        }
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !(3..=32).contains(&username.len()) || !valid_chars {
        return Err(AppError::BadRequest(
            "Usernames are 3 to 32 letters, digits, dots, dashes or underscores.".into(),
        ));
    }
    Ok(())
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let username = username.trim();
    let email = email.trim().to_lowercase();
    validate_username(username)?;
    if !email.contains('@') {
        return Err(AppError::BadRequest("Please enter a valid email address.".into()));
    }
    if password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Passwords need at least 8 characters.".into(),
        ));
    }
    if !registration_allowed(state, &email).await? {
        return Err(AppError::BadRequest(
            "Registration is invite-only and this email is not on the list.".into(),
        ));
    }

    let taken: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?2")
            .bind(username)
            .bind(&email)
            .fetch_one(&state.db)
            .await?;
    if taken > 0 {
        return Err(AppError::BadRequest(
            "That username or email is already registered.".into(),
        ));
    }

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let role = if user_count == 0 {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let password_hash = hash_password(password)?;
    let uuid = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO users (uuid, username, email, password_hash, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
    )
    .bind(&uuid)
    .bind(username)
    .bind(&email)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    let user = find_user_by_uuid(state, &uuid).await?;
    info!(user_id = user.id, username, role = %role, "user registered");
    Ok(user.into())
}

/// Logs in by username or email.
pub async fn authenticate_user(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let identifier = identifier.trim();
    if identifier.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Please fill in both fields.".into()));
    }
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?2");
    let user: Option<User> = sqlx::query_as(&sql)
        .bind(identifier)
        .bind(identifier.to_lowercase())
        .fetch_optional(&state.db)
        .await?;
    let Some(user) = user else {
        debug!(identifier, "login for unknown user");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, &user.password_hash) {
        debug!(user_id = user.id, "login with wrong password");
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(user.into())
}

async fn find_user_by_uuid(state: &AppState, uuid: &str) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?1");
    sqlx::query_as(&sql)
        .bind(uuid)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let session_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at)
           VALUES (?1, ?2, ?3, ?3, ?4)"#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now + Duration::days(SESSION_LIFETIME_DAYS))
    .execute(&state.db)
    .await?;
    Ok(session_id)
}

pub async fn lookup_session(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let session: Option<Session> = sqlx::query_as(
        "SELECT id, user_id, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(session) = session else {
        return Ok(None);
    };
    let now = Utc::now();
    if session.is_expired(now) {
        destroy_session(state, &session.id).await?;
        return Ok(None);
    }

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user: Option<User> = sqlx::query_as(&sql)
        .bind(session.user_id)
        .fetch_optional(&state.db)
        .await?;

    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    Ok(user.map(AuthenticatedUser::from))
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// An empty allowlist leaves registration open.
pub async fn registration_allowed(state: &AppState, email: &str) -> Result<bool, AppError> {
    let listed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM allowed_users")
        .fetch_one(&state.db)
        .await?;
    if listed == 0 {
        return Ok(true);
    }
    let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM allowed_users WHERE email = ?1")
        .bind(email.trim().to_lowercase())
        .fetch_one(&state.db)
        .await?;
    Ok(matches > 0)
}

pub async fn list_allowed_users(state: &AppState) -> Result<Vec<AllowedUser>, AppError> {
    Ok(
        sqlx::query_as("SELECT email, added_at FROM allowed_users ORDER BY email")
            .fetch_all(&state.db)
            .await?,
    )
}

pub async fn allow_email(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("Please enter a valid email address.".into()));
    }
    sqlx::query("INSERT OR IGNORE INTO allowed_users (email, added_at) VALUES (?1, ?2)")
        .bind(&email)
        .bind(Utc::now())
        .execute(&state.db)
        .await?;
    info!(email = %email, "email added to registration allowlist");
    Ok(())
}

pub async fn disallow_email(state: &AppState, email: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM allowed_users WHERE email = ?1")
        .bind(email.trim().to_lowercase())
        .execute(&state.db)
        .await?;
    Ok(())
}
