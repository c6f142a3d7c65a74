use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Local;
use serde::Deserialize;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    services::stats::{distinct_days, RankedCount, TripStats, DEFAULT_TOP_N},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/register", get(register_form).post(register_submit))
        .route("/logout", post(logout))
        .route("/u/:username", get(public_profile))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    logged_in: bool,
    is_admin: bool,
    riding_now: Option<String>,
}

async fn landing(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let riding_now = match &current.0 {
        Some(user) => state
            .trips
            .active_trip(user.id)
            .await?
            .map(|trip| format!("{} from {}", trip.route, trip.start_label())),
        None => None,
    };
    Ok(AskamaTemplateResponse::into_response(LandingTemplate {
        logged_in: current.0.is_some(),
        is_admin: current.is_admin(),
        riding_now,
    }))
}

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    error: Option<String>,
    identifier: String,
}

#[derive(Template)]
#[template(path = "auth/register.html")]
struct RegisterTemplate {
    error: Option<String>,
    invite_only: bool,
    username: String,
    email: String,
}

/// Opens a session for `user_id` and sends the rider to their trips.
async fn start_session(
    state: &AppState,
    jar: PrivateCookieJar,
    user_id: i64,
) -> Result<Response, AppError> {
    let session_id = auth::create_session(state, user_id).await?;
    Ok((
        auth::apply_session_cookie(jar, &session_id),
        Redirect::to("/me"),
    )
        .into_response())
}

fn rejected(page: impl IntoResponse) -> Response {
    (StatusCode::BAD_REQUEST, page).into_response()
}

async fn invite_only(state: &AppState) -> Result<bool, AppError> {
    Ok(!auth::list_allowed_users(state).await?.is_empty())
}

async fn login_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LoginTemplate {
        error: None,
        identifier: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    identifier: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let error = match auth::authenticate_user(&state, &form.identifier, &form.password).await {
        Ok(user) => return start_session(&state, jar, user.id).await,
        Err(AppError::Unauthorized) => "Unknown username or wrong password.".to_string(),
        Err(AppError::BadRequest(msg)) => msg,
        Err(err) => return Err(err),
    };
    Ok(rejected(LoginTemplate {
        error: Some(error),
        identifier: form.identifier,
    }))
}

async fn register_form(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(AskamaTemplateResponse::into_response(RegisterTemplate {
        error: None,
        invite_only: invite_only(&state).await?,
        username: String::new(),
        email: String::new(),
    }))
}

#[derive(Deserialize)]
struct RegisterForm {
    username: String,
    email: String,
    password: String,
    password_confirm: String,
}

async fn register_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let outcome = if form.password == form.password_confirm {
        auth::register_user(&state, &form.username, &form.email, &form.password).await
    } else {
        Err(AppError::BadRequest("The passwords do not match.".into()))
    };
    let error = match outcome {
        Ok(user) => return start_session(&state, jar, user.id).await,
        Err(AppError::BadRequest(msg)) => msg,
        Err(err) => return Err(err),
    };
    Ok(rejected(RegisterTemplate {
        error: Some(error),
        invite_only: invite_only(&state).await?,
        username: form.username,
        email: form.email,
    }))
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let session_id = jar.get(auth::SESSION_COOKIE).map(|cookie| cookie.value().to_owned());
    if let Some(session_id) = session_id {
        auth::destroy_session(&state, &session_id).await?;
    }
    Ok((auth::clear_session_cookie(jar), Redirect::to("/")))
}

#[derive(Template)]
#[template(path = "public_profile.html")]
struct PublicProfileTemplate {
    display_name: String,
    emoji: String,
    default_agency: String,
    stats: TripStats,
    total_time: String,
    riding_days: usize,
    top_routes: Vec<RankedCount>,
    top_stops: Vec<RankedCount>,
}

async fn public_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (user, profile) = state.profiles.find_public(&username).await?;
    let trips = state.trips.all_trips(user.id).await?;
    let stats = TripStats::from_trips(&trips, Local::now().date_naive(), DEFAULT_TOP_N);
    Ok(AskamaTemplateResponse::into_response(
        PublicProfileTemplate {
            display_name: profile.display_name(&user.username).to_string(),
            emoji: profile.emoji.clone(),
            default_agency: profile.default_agency.clone(),
            total_time: stats.total_time_text(),
            riding_days: distinct_days(&trips),
            top_routes: stats.top_routes.clone(),
            top_stops: stats.top_stops.clone(),
            stats,
        },
    ))
}
