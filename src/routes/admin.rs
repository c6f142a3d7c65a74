use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};
use sqlx::Row;
use tracing::info;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    models::{
        stop::{NewStop, Stop},
        trip::TripSource,
        user::UserRole,
    },
    routes::{format_timestamp, normalize_optional},
    services::{
        reconcile::{scan_unmatched, UnmatchedStop},
        stats::{TripStats, DEFAULT_TOP_N},
        trips::RECENT_TRIPS,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/users", get(users_list))
        .route("/users/:id", get(user_detail).post(update_user_role))
        .route("/stops", get(stops_list).post(stop_create))
        .route("/stops/:id/aliases", post(alias_add))
        .route("/stops/:id/aliases/remove", post(alias_remove))
        .route("/inbox", get(inbox))
        .route("/inbox/link", post(inbox_link))
        .route("/inbox/create", post(inbox_create))
        .route("/sms-trips", get(sms_trips))
        .route("/allowed", get(allowed_list).post(allowed_add))
        .route("/allowed/remove", post(allowed_remove))
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct AdminDashboardTemplate {
    user_count: i64,
    trip_count: i64,
    unverified_count: i64,
    stop_count: i64,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    Ok(AskamaTemplateResponse::into_response(
        AdminDashboardTemplate {
            user_count,
            trip_count: state.trips.count_all().await?,
            unverified_count: state.trips.count_unverified().await?,
            stop_count: state.stops.count().await?,
        },
    ))
}

#[derive(Template)]
#[template(path = "admin/users_list.html")]
struct AdminUsersTemplate {
    users: Vec<AdminUserRow>,
}

#[derive(Clone)]
struct AdminUserRow {
    id: i64,
    username: String,
    email: String,
    role: String,
    created_at: String,
    last_login_at: String,
}

impl AdminUserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            role: row.get("role"),
            created_at: format_timestamp(row.get::<DateTime<Utc>, _>("created_at")),
            last_login_at: row
                .get::<Option<DateTime<Utc>>, _>("last_login_at")
                .map(format_timestamp)
                .unwrap_or_else(|| "–".into()),
        }
    }
}

async fn users_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let rows = sqlx::query(
        r#"SELECT id, username, email, role, created_at, last_login_at FROM users ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await?;
    let users = rows.iter().map(AdminUserRow::from_row).collect();
    Ok(AskamaTemplateResponse::into_response(AdminUsersTemplate {
        users,
    }))
}

#[derive(Template)]
#[template(path = "admin/user_detail.html")]
struct AdminUserDetailTemplate {
    user: AdminUserRow,
    stats: TripStats,
    total_time: String,
    unmatched_count: usize,
}

async fn user_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let row = sqlx::query(
        "SELECT id, username, email, role, created_at, last_login_at FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(row) = row else {
        return Err(AppError::NotFound);
    };
    let user_row = AdminUserRow::from_row(&row);
    let trips = state.trips.all_trips(user_id).await?;
    let stats = TripStats::from_trips(&trips, chrono::Local::now().date_naive(), DEFAULT_TOP_N);
    let recent = state.trips.recent_trips(user_id, RECENT_TRIPS).await?;
    let index = state.stops.index().await?;
    Ok(AskamaTemplateResponse::into_response(
        AdminUserDetailTemplate {
            user: user_row,
            total_time: stats.total_time_text(),
            unmatched_count: scan_unmatched(&recent, &index).len(),
            stats,
        },
    ))
}

#[derive(Deserialize)]
struct RoleForm {
    role: String,
}

async fn update_user_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Result<Redirect, AppError> {
    let admin = current.require_admin()?;
    let Some(role) = UserRole::parse(&form.role) else {
        return Err(AppError::BadRequest("Unknown role".into()));
    };
    if admin.id == user_id && role != UserRole::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role.".into(),
        ));
    }
    sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
        .bind(role.as_str())
        .bind(user_id)
        .execute(&state.db)
        .await?;
    info!(user_id, role = %role, "user role changed");
    Ok(Redirect::to(&format!("/admin/users/{user_id}")))
}

#[derive(Clone)]
struct StopRowView {
    id: String,
    label: String,
    agency: String,
    coordinates: String,
    aliases: Vec<String>,
}

impl From<Stop> for StopRowView {
    fn from(stop: Stop) -> Self {
        Self {
            label: stop.label(),
            coordinates: match (stop.lat, stop.lng) {
                (Some(lat), Some(lng)) => format!("{lat:.5}, {lng:.5}"),
                _ => "–".into(),
            },
            id: stop.id,
            agency: stop.agency,
            aliases: stop.aliases,
        }
    }
}

#[derive(Template)]
#[template(path = "admin/stops.html")]
struct AdminStopsTemplate {
    stops: Vec<StopRowView>,
}

async fn stops_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let stops = state.stops.list().await?;
    Ok(AskamaTemplateResponse::into_response(AdminStopsTemplate {
        stops: stops.into_iter().map(StopRowView::from).collect(),
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct StopForm {
    name: String,
    code: Option<String>,
    #[serde(default)]
    agency: String,
    direction: Option<String>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lat: Option<f64>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lng: Option<f64>,
}

impl From<StopForm> for NewStop {
    fn from(form: StopForm) -> Self {
        NewStop {
            name: form.name,
            code: normalize_optional(form.code),
            agency: form.agency,
            direction: normalize_optional(form.direction),
            lat: form.lat,
            lng: form.lng,
        }
    }
}

async fn stop_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<StopForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    state.stops.create(form.into()).await?;
    Ok(Redirect::to("/admin/stops"))
}

#[derive(Deserialize)]
struct AliasForm {
    alias: String,
}

async fn alias_add(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<String>,
    Form(form): Form<AliasForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    state.stops.add_alias(&stop_id, &form.alias).await?;
    Ok(Redirect::to("/admin/stops"))
}

async fn alias_remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<String>,
    Form(form): Form<AliasForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    state.stops.remove_alias(&stop_id, &form.alias).await?;
    Ok(Redirect::to("/admin/stops"))
}

#[derive(Deserialize)]
struct InboxQuery {
    user_id: Option<i64>,
    linked: Option<u64>,
}

#[derive(Clone)]
struct Choice {
    id: String,
    label: String,
}

#[derive(Template)]
#[template(path = "admin/inbox.html")]
struct AdminInboxTemplate {
    user_id: i64,
    username: String,
    users: Vec<Choice>,
    queue: Vec<UnmatchedStop>,
    stops: Vec<Choice>,
    has_notice: bool,
    notice: String,
}

async fn inbox(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<InboxQuery>,
) -> Result<impl IntoResponse, AppError> {
    let admin = current.require_admin()?;
    let user_id = query.user_id.unwrap_or(admin.id);
    let users: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, username FROM users ORDER BY username")
            .fetch_all(&state.db)
            .await?;
    let username = users
        .iter()
        .find(|(id, _)| *id == user_id)
        .map(|(_, name)| name.clone())
        .ok_or(AppError::NotFound)?;

    let trips = state.trips.recent_trips(user_id, RECENT_TRIPS).await?;
    let index = state.stops.index().await?;
    let queue = scan_unmatched(&trips, &index);
    let stops = index
        .stops()
        .iter()
        .map(|stop| Choice {
            id: stop.id.clone(),
            label: stop.label(),
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(AdminInboxTemplate {
        user_id,
        username,
        users: users
            .into_iter()
            .map(|(id, name)| Choice {
                id: id.to_string(),
                label: name,
            })
            .collect(),
        queue,
        stops,
        has_notice: query.linked.is_some(),
        notice: query
            .linked
            .map(|n| format!("Linked. {n} trip stops updated."))
            .unwrap_or_default(),
    }))
}

#[derive(Deserialize)]
struct LinkForm {
    user_id: i64,
    value: String,
    stop_id: String,
}

async fn inbox_link(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<LinkForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    let outcome = state
        .reconciler
        .link_value(form.user_id, &form.value, &form.stop_id)
        .await?;
    Ok(Redirect::to(&format!(
        "/admin/inbox?user_id={}&linked={}",
        form.user_id,
        outcome.total()
    )))
}

#[serde_as]
#[derive(Deserialize)]
struct CreateLinkForm {
    user_id: i64,
    value: String,
    name: String,
    code: Option<String>,
    #[serde(default)]
    agency: String,
    direction: Option<String>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lat: Option<f64>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lng: Option<f64>,
}

async fn inbox_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<CreateLinkForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    let new = NewStop {
        name: form.name,
        code: normalize_optional(form.code),
        agency: form.agency,
        direction: normalize_optional(form.direction),
        lat: form.lat,
        lng: form.lng,
    };
    let (_, outcome) = state
        .reconciler
        .create_and_link(form.user_id, &form.value, new)
        .await?;
    Ok(Redirect::to(&format!(
        "/admin/inbox?user_id={}&linked={}",
        form.user_id,
        outcome.total()
    )))
}

#[derive(Clone)]
struct SmsTripRow {
    when: String,
    user_id: i64,
    route: String,
    start: String,
    end: String,
}

#[derive(Template)]
#[template(path = "admin/sms_trips.html")]
struct AdminSmsTripsTemplate {
    trips: Vec<SmsTripRow>,
}

async fn sms_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let trips = state.trips.unverified_trips(TripSource::Sms, 200).await?;
    let rows = trips
        .iter()
        .map(|trip| SmsTripRow {
            when: format_timestamp(trip.start_time),
            user_id: trip.user_id,
            route: trip.route.clone(),
            start: trip.start_label().to_string(),
            end: trip.end_label().unwrap_or("…").to_string(),
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(
        AdminSmsTripsTemplate { trips: rows },
    ))
}

#[derive(Clone)]
struct AllowedRow {
    email: String,
    added_at: String,
}

#[derive(Template)]
#[template(path = "admin/allowed.html")]
struct AdminAllowedTemplate {
    entries: Vec<AllowedRow>,
}

async fn allowed_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    let entries = auth::list_allowed_users(&state)
        .await?
        .into_iter()
        .map(|entry| AllowedRow {
            email: entry.email,
            added_at: format_timestamp(entry.added_at),
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(
        AdminAllowedTemplate { entries },
    ))
}

#[derive(Deserialize)]
struct AllowedForm {
    email: String,
}

async fn allowed_add(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<AllowedForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    auth::allow_email(&state, &form.email).await?;
    Ok(Redirect::to("/admin/allowed"))
}

async fn allowed_remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<AllowedForm>,
) -> Result<Redirect, AppError> {
    current.require_admin()?;
    auth::disallow_email(&state, &form.email).await?;
    Ok(Redirect::to("/admin/allowed"))
}
