use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};
use tracing::info;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        template::TripTemplate,
        trip::{EndTrip, GeoPoint, NewTrip, Trip, TripSource},
    },
    routes::{format_timestamp, normalize_optional},
    services::{
        export,
        heatmap::{build_heatmap, Heatmap, HeatmapConfig, HeatmapKind},
        profiles::ProfileUpdate,
        stats::{RankedCount, TripStats, DEFAULT_TOP_N},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/trips", get(trips_list))
        .route("/trips/start", post(trip_start))
        .route("/trips/end", post(trip_end))
        .route("/trips/cancel", post(trip_cancel))
        .route("/trips/:id/delete", post(trip_delete))
        .route("/stats", get(stats_page))
        .route("/stats.json", get(stats_json))
        .route("/heatmap", get(heatmap_page))
        .route("/heatmap.json", get(heatmap_json))
        .route("/export.csv", get(export_csv))
        .route("/profile", get(profile_form).post(profile_submit))
        .route("/templates", post(template_create))
        .route("/templates/:id/delete", post(template_delete))
        .route("/templates/:id/start", post(template_start))
}

#[derive(Clone)]
struct TripRow {
    id: String,
    when: String,
    route: String,
    start: String,
    end: String,
    duration: String,
    source: String,
    verified: bool,
}

impl From<&Trip> for TripRow {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id.clone(),
            when: format_timestamp(trip.start_time),
            route: trip.route.clone(),
            start: trip.start_label().to_string(),
            end: trip.end_label().unwrap_or("…").to_string(),
            duration: trip
                .duration
                .map(|d| format!("{d} min"))
                .unwrap_or_default(),
            source: trip.source.to_string(),
            verified: trip.verified,
        }
    }
}

#[derive(Clone)]
struct TemplateRow {
    id: String,
    label: String,
    route: String,
    start_stop: String,
}

impl From<TripTemplate> for TemplateRow {
    fn from(template: TripTemplate) -> Self {
        Self {
            id: template.id,
            label: template.label,
            route: template.route,
            start_stop: template.start_stop,
        }
    }
}

#[derive(Template)]
#[template(path = "user/dashboard.html")]
struct DashboardTemplate {
    display_name: String,
    emoji: String,
    is_admin: bool,
    has_active: bool,
    active: TripRow,
    templates: Vec<TemplateRow>,
    recent: Vec<TripRow>,
    stop_names: Vec<String>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let profile = state.profiles.get(user.id).await?;
    let active = state.trips.active_trip(user.id).await?;
    let recent = state.trips.recent_trips(user.id, 10).await?;
    let templates = state.templates.list(user.id).await?;
    let stop_names = state
        .stops
        .list()
        .await?
        .into_iter()
        .map(|stop| stop.name)
        .collect();

    Ok(AskamaTemplateResponse::into_response(DashboardTemplate {
        display_name: profile.display_name(&user.username).to_string(),
        emoji: profile.emoji.clone(),
        is_admin: current.is_admin(),
        has_active: active.is_some(),
        active: active
            .as_ref()
            .map(TripRow::from)
            .unwrap_or_else(empty_trip_row),
        templates: templates.into_iter().map(TemplateRow::from).collect(),
        recent: recent.iter().map(TripRow::from).collect(),
        stop_names,
    }))
}

fn empty_trip_row() -> TripRow {
    TripRow {
        id: String::new(),
        when: String::new(),
        route: String::new(),
        start: String::new(),
        end: String::new(),
        duration: String::new(),
        source: String::new(),
        verified: false,
    }
}

#[derive(Template)]
#[template(path = "user/trips_list.html")]
struct TripsListTemplate {
    trips: Vec<TripRow>,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.all_trips(user.id).await?;
    Ok(AskamaTemplateResponse::into_response(TripsListTemplate {
        trips: trips.iter().map(TripRow::from).collect(),
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct StartTripForm {
    route: String,
    start_stop: String,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lat: Option<f64>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lng: Option<f64>,
}

async fn trip_start(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<StartTripForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state
        .trips
        .start_trip(
            user.id,
            NewTrip {
                route: form.route,
                start_stop: form.start_stop,
                boarding: GeoPoint::from_parts(form.lat, form.lng),
                source: TripSource::Web,
            },
        )
        .await?;
    Ok(Redirect::to("/me"))
}

#[serde_as]
#[derive(Deserialize)]
struct EndTripForm {
    end_stop: String,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lat: Option<f64>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    lng: Option<f64>,
}

async fn trip_end(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<EndTripForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state
        .trips
        .end_trip(
            user.id,
            EndTrip {
                end_stop: form.end_stop,
                exit: GeoPoint::from_parts(form.lat, form.lng),
            },
        )
        .await?;
    Ok(Redirect::to("/me"))
}

async fn trip_cancel(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state.trips.cancel_active(user.id).await?;
    Ok(Redirect::to("/me"))
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state.trips.delete_trip(user.id, &trip_id).await?;
    Ok(Redirect::to("/me/trips"))
}

#[derive(Template)]
#[template(path = "user/stats.html")]
struct StatsTemplate {
    stats: TripStats,
    total_time: String,
    top_routes: Vec<RankedCount>,
    top_stops: Vec<RankedCount>,
}

async fn load_stats(state: &AppState, user_id: i64) -> Result<TripStats, AppError> {
    let trips = state.trips.all_trips(user_id).await?;
    Ok(TripStats::from_trips(
        &trips,
        Local::now().date_naive(),
        DEFAULT_TOP_N,
    ))
}

async fn stats_page(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let stats = load_stats(&state, user.id).await?;
    Ok(AskamaTemplateResponse::into_response(StatsTemplate {
        total_time: stats.total_time_text(),
        top_routes: stats.top_routes.clone(),
        top_stops: stats.top_stops.clone(),
        stats,
    }))
}

async fn stats_json(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<TripStats>, AppError> {
    let user = current.require_user()?;
    Ok(Json(load_stats(&state, user.id).await?))
}

#[derive(Template)]
#[template(path = "user/heatmap.html")]
struct HeatmapTemplate;

async fn heatmap_page(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(HeatmapTemplate))
}

#[derive(Deserialize)]
struct HeatmapQuery {
    #[serde(default)]
    kind: HeatmapKind,
    cell_size: Option<f64>,
}

async fn heatmap_json(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<Heatmap>, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.all_trips(user.id).await?;
    let mut config = HeatmapConfig::default();
    if let Some(size) = query.cell_size.filter(|s| s.is_finite() && *s >= 10.0) {
        config.cell_size_meters = size;
    }
    Ok(Json(build_heatmap(&trips, query.kind, &config)))
}

#[serde_as]
#[derive(Deserialize)]
struct ExportQuery {
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    from: Option<NaiveDate>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    to: Option<NaiveDate>,
}

fn local_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn export_csv(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let from = query.from.and_then(local_midnight);
    let to = query
        .to
        .and_then(|date| date.succ_opt())
        .and_then(local_midnight);
    let trips = state.trips.trips_between(user.id, from, to).await?;
    let body = export::trips_to_csv(&trips)?;
    info!(user_id = user.id, rows = trips.len(), "csv export");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"trips.csv\"",
            ),
        ],
        body,
    ))
}

#[derive(Template)]
#[template(path = "user/profile.html")]
struct ProfileTemplate {
    name: String,
    emoji: String,
    default_agency: String,
    is_public: bool,
    public_url: String,
    sms_phone: String,
    sms_confirmed: bool,
}

async fn profile_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let profile = state.profiles.get(user.id).await?;
    Ok(AskamaTemplateResponse::into_response(ProfileTemplate {
        public_url: state.config.public_profile_url(&user.username),
        name: profile.name,
        emoji: profile.emoji,
        default_agency: profile.default_agency,
        is_public: profile.is_public,
        sms_phone: profile.sms_phone.unwrap_or_default(),
        sms_confirmed: profile.sms_confirmed,
    }))
}

#[derive(Deserialize)]
struct ProfileForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    emoji: String,
    #[serde(default)]
    default_agency: String,
    is_public: Option<String>,
    sms_phone: Option<String>,
}

async fn profile_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state
        .profiles
        .save(
            user.id,
            ProfileUpdate {
                name: form.name,
                emoji: form.emoji,
                default_agency: form.default_agency,
                is_public: form.is_public.is_some(),
                sms_phone: normalize_optional(form.sms_phone),
            },
        )
        .await?;
    Ok(Redirect::to("/me/profile"))
}

#[derive(Deserialize)]
struct TemplateForm {
    label: Option<String>,
    route: String,
    start_stop: String,
}

async fn template_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TemplateForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let label = normalize_optional(form.label);
    state
        .templates
        .create(user.id, label.as_deref(), &form.route, &form.start_stop)
        .await?;
    Ok(Redirect::to("/me"))
}

async fn template_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state.templates.delete(user.id, &template_id).await?;
    Ok(Redirect::to("/me"))
}

async fn template_start(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let template = state.templates.get(user.id, &template_id).await?;
    state
        .trips
        .start_trip(
            user.id,
            NewTrip {
                route: template.route,
                start_stop: template.start_stop,
                ..NewTrip::default()
            },
        )
        .await?;
    Ok(Redirect::to("/me"))
}
