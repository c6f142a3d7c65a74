use std::{fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use tower::ServiceExt;
use tripbook::{
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::{init_pool, run_migrations},
    models::{
        stop::NewStop,
        trip::{EndTrip, GeoPoint, NewTrip, Trip, TripSource},
        user::UserRole,
    },
    routes::create_router,
    services::{profiles::ProfileUpdate, reconcile::scan_unmatched, trips::RECENT_TRIPS},
    state::AppState,
};
use url::Url;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    registered_user: Option<AuthenticatedUser>,
    template_id: Option<String>,
    last_reply: Option<String>,
    last_response: Option<(StatusCode, String, String)>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self) -> &AuthenticatedUser {
        self.registered_user
            .as_ref()
            .expect("a user must be registered first")
    }

    async fn latest_trip(&self) -> Trip {
        let trips = self
            .app_state()
            .trips
            .recent_trips(self.user().id, 1)
            .await
            .expect("load trips");
        trips.into_iter().next().expect("at least one trip expected")
    }

    /// Sends `request` through the full router, authenticated as the registered user if any.
    async fn call(&mut self, mut request: Request<Body>) -> (StatusCode, String, String) {
        if let Some(user) = &self.registered_user {
            request.extensions_mut().insert(user.clone());
        }
        let app = create_router(self.app_state().clone());
        let response = app.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let result = (
            status,
            content_type,
            String::from_utf8_lossy(&bytes).into_owned(),
        );
        self.last_response = Some(result.clone());
        result
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: "bdd-cookie-secret".into(),
            public_base_url: Url::parse("http://localhost:3000/")?,
            sms_webhook_token: None,
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let app = AppState::new(config, db);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.registered_user = None;
}

#[given(
    regex = r#"^a registered user "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#
)]
async fn given_registered_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    register_user(world, username, email, password).await;
}

#[when(
    regex = r#"^I register a user "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#
)]
async fn when_register_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    register_user(world, username, email, password).await;
}

async fn register_user(world: &mut AppWorld, username: String, email: String, password: String) {
    let created = auth::register_user(world.app_state(), &username, &email, &password)
        .await
        .expect("register user");
    world.registered_user = Some(created);
}

#[then(regex = r#"^I can authenticate as "([^"]+)" using password "([^"]+)"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, identifier: String, password: String) {
    let authed = auth::authenticate_user(world.app_state(), &identifier, &password)
        .await
        .expect("authentication");
    assert_eq!(authed.id, world.user().id);
}

#[then(regex = r#"^authenticating as "([^"]+)" using password "([^"]+)" fails$"#)]
async fn then_cannot_authenticate(world: &mut AppWorld, identifier: String, password: String) {
    let result = auth::authenticate_user(world.app_state(), &identifier, &password).await;
    assert!(result.is_err());
}

#[then("the registered user is an admin")]
async fn then_user_is_admin(world: &mut AppWorld) {
    assert_eq!(world.user().role, UserRole::Admin);
}

#[given(regex = r#"^the email "([^"]+)" is on the allowlist$"#)]
async fn given_allowlisted(world: &mut AppWorld, email: String) {
    auth::allow_email(world.app_state(), &email)
        .await
        .expect("allow email");
}

#[then(regex = r#"^registering "([^"]+)" with email "([^"]+)" is refused$"#)]
async fn then_registration_refused(world: &mut AppWorld, username: String, email: String) {
    let result =
        auth::register_user(world.app_state(), &username, &email, "correct-horse").await;
    assert!(result.is_err(), "registration should have been refused");
}

#[then(regex = r#"^the public page of "([^"]+)" is not found$"#)]
async fn then_public_page_missing(world: &mut AppWorld, username: String) {
    let request = Request::get(format!("/u/{username}"))
        .body(Body::empty())
        .expect("request");
    let (status, _, _) = world.call(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[then(regex = r#"^the public page of "([^"]+)" is shown$"#)]
async fn then_public_page_shown(world: &mut AppWorld, username: String) {
    let request = Request::get(format!("/u/{username}"))
        .body(Body::empty())
        .expect("request");
    let (status, _, body) = world.call(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&username));
}

#[when("the user makes their profile public")]
async fn when_profile_public(world: &mut AppWorld) {
    let user_id = world.user().id;
    world
        .app_state()
        .profiles
        .save(
            user_id,
            ProfileUpdate {
                is_public: true,
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect("save profile");
}

#[when(regex = r#"^I start a trip on route "([^"]+)" at "([^"]+)"$"#)]
async fn when_start_trip(world: &mut AppWorld, route: String, stop: String) {
    let user_id = world.user().id;
    world
        .app_state()
        .trips
        .start_trip(
            user_id,
            NewTrip {
                route,
                start_stop: stop,
                ..NewTrip::default()
            },
        )
        .await
        .expect("start trip");
}

#[then(regex = r#"^starting a trip on route "([^"]+)" at "([^"]+)" is refused$"#)]
async fn then_start_refused(world: &mut AppWorld, route: String, stop: String) {
    let user_id = world.user().id;
    let result = world
        .app_state()
        .trips
        .start_trip(
            user_id,
            NewTrip {
                route,
                start_stop: stop,
                ..NewTrip::default()
            },
        )
        .await;
    assert!(result.is_err(), "second active trip should be refused");
}

#[when(regex = r#"^I end the trip at "([^"]+)"$"#)]
async fn when_end_trip(world: &mut AppWorld, stop: String) {
    let user_id = world.user().id;
    world
        .app_state()
        .trips
        .end_trip(
            user_id,
            EndTrip {
                end_stop: stop,
                exit: None,
            },
        )
        .await
        .expect("end trip");
}

#[then(regex = r#"^I have an active trip on route "([^"]+)"$"#)]
async fn then_active_trip(world: &mut AppWorld, route: String) {
    let active = world
        .app_state()
        .trips
        .active_trip(world.user().id)
        .await
        .expect("load active trip")
        .expect("an active trip");
    assert_eq!(active.route, route);
    assert!(active.end_stop.is_none());
}

#[then("I have no active trip")]
async fn then_no_active_trip(world: &mut AppWorld) {
    let active = world
        .app_state()
        .trips
        .active_trip(world.user().id)
        .await
        .expect("load active trip");
    assert!(active.is_none());
}

#[then(regex = r#"^the latest trip ended at stop code "([^"]+)"$"#)]
async fn then_latest_end_code(world: &mut AppWorld, code: String) {
    let trip = world.latest_trip().await;
    assert_eq!(trip.end_stop_code.as_deref(), Some(code.as_str()));
    assert_eq!(trip.end_stop_name, None);
    assert!(trip.duration.is_some());
}

#[then(regex = r"^the user has (\d+) stored trips$")]
async fn then_user_has_trips(world: &mut AppWorld, expected: usize) {
    let trips = world
        .app_state()
        .trips
        .all_trips(world.user().id)
        .await
        .expect("load trips");
    assert_eq!(trips.len(), expected);
}

#[given(regex = r#"^the stop library has "([^"]+)" with code "([^"]+)" and alias "([^"]+)"$"#)]
async fn given_library_stop(world: &mut AppWorld, name: String, code: String, alias: String) {
    let stops = &world.app_state().stops;
    let stop = stops
        .create(NewStop {
            name,
            code: Some(code),
            agency: "TTC".into(),
            lat: Some(43.6453),
            lng: Some(-79.3806),
            ..NewStop::default()
        })
        .await
        .expect("create stop");
    stops.add_alias(&stop.id, &alias).await.expect("add alias");
}

#[then(regex = r#"^the latest trip starts at canonical stop "([^"]+)"$"#)]
async fn then_latest_start_canonical(world: &mut AppWorld, name: String) {
    let trip = world.latest_trip().await;
    assert_eq!(trip.start_stop_name.as_deref(), Some(name.as_str()));
    assert!(trip.start_stop_id.is_some());
    assert!(trip.boarding_location().is_some());
}

#[given(regex = r#"^a template for route "([^"]+)" from "([^"]+)"$"#)]
async fn given_template(world: &mut AppWorld, route: String, stop: String) {
    let user_id = world.user().id;
    let template = world
        .app_state()
        .templates
        .create(user_id, None, &route, &stop)
        .await
        .expect("create template");
    world.template_id = Some(template.id);
}

#[when("I start a trip from that template")]
async fn when_start_from_template(world: &mut AppWorld) {
    let template_id = world.template_id.clone().expect("template exists");
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/me/templates/{template_id}/start"))
        .body(Body::empty())
        .expect("request");
    let (status, _, _) = world.call(request).await;
    assert!(status.is_redirection(), "unexpected status {status}");
}

async fn export_csv(world: &mut AppWorld) -> String {
    let request = Request::get("/me/export.csv")
        .body(Body::empty())
        .expect("request");
    let (status, content_type, body) = world.call(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/csv"));
    body
}

#[then(regex = r"^the CSV export has (\d+) lines$")]
async fn then_csv_lines(world: &mut AppWorld, expected: usize) {
    let body = export_csv(world).await;
    assert!(body.starts_with("Date,Route,Start Stop,End Stop,Duration,Start Time,End Time"));
    assert_eq!(body.lines().count(), expected);
}

#[then(regex = r#"^the CSV export quotes "([^"]+)"$"#)]
async fn then_csv_quotes(world: &mut AppWorld, value: String) {
    let body = export_csv(world).await;
    assert!(body.contains(&format!("\"{value}\"")), "csv was: {body}");
}

#[given(regex = r#"^(\d+) trips from "([^"]+)" to "([^"]+)"$"#)]
async fn given_trips(world: &mut AppWorld, count: usize, from: String, to: String) {
    let user_id = world.user().id;
    let trips = &world.app_state().trips;
    for _ in 0..count {
        trips
            .start_trip(
                user_id,
                NewTrip {
                    route: "504".into(),
                    start_stop: from.clone(),
                    ..NewTrip::default()
                },
            )
            .await
            .expect("start trip");
        trips
            .end_trip(
                user_id,
                EndTrip {
                    end_stop: to.clone(),
                    exit: None,
                },
            )
            .await
            .expect("end trip");
    }
}

async fn inbox(world: &AppWorld) -> Vec<(String, usize)> {
    let state = world.app_state();
    let trips = state
        .trips
        .recent_trips(world.user().id, RECENT_TRIPS)
        .await
        .expect("load trips");
    let index = state.stops.index().await.expect("stop index");
    scan_unmatched(&trips, &index)
        .into_iter()
        .map(|item| (item.value, item.count))
        .collect()
}

#[then(regex = r#"^the inbox lists "([^"]+)" seen (\d+) times$"#)]
async fn then_inbox_lists(world: &mut AppWorld, value: String, count: usize) {
    let queue = inbox(world).await;
    assert!(queue.contains(&(value, count)), "inbox was {queue:?}");
}

#[then(regex = r#"^the inbox does not list "([^"]+)"$"#)]
async fn then_inbox_missing(world: &mut AppWorld, value: String) {
    let queue = inbox(world).await;
    assert!(queue.iter().all(|(v, _)| *v != value), "inbox was {queue:?}");
}

#[then("the inbox is empty")]
async fn then_inbox_empty(world: &mut AppWorld) {
    let queue = inbox(world).await;
    assert!(queue.is_empty(), "inbox was {queue:?}");
}

async fn stop_id_by_name(world: &AppWorld, name: &str) -> String {
    world
        .app_state()
        .stops
        .list()
        .await
        .expect("list stops")
        .into_iter()
        .find(|stop| stop.name == name)
        .map(|stop| stop.id)
        .expect("stop exists")
}

#[when(regex = r#"^I link "([^"]+)" to the stop "([^"]+)"$"#)]
async fn when_link(world: &mut AppWorld, value: String, name: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let outcome = world
        .app_state()
        .reconciler
        .link_value(world.user().id, &value, &stop_id)
        .await
        .expect("link value");
    assert!(outcome.total() > 0);
}

#[when(regex = r#"^I create the stop "([^"]+)" for "([^"]+)"$"#)]
async fn when_create_and_link(world: &mut AppWorld, name: String, value: String) {
    let (stop, outcome) = world
        .app_state()
        .reconciler
        .create_and_link(
            world.user().id,
            &value,
            NewStop {
                name,
                agency: "TTC".into(),
                ..NewStop::default()
            },
        )
        .await
        .expect("create and link");
    assert!(stop.aliases.contains(&value));
    assert!(outcome.end_updates > 0);
}

#[then(regex = r#"^(\d+) trips start at the stop "([^"]+)"$"#)]
async fn then_trips_start_at(world: &mut AppWorld, expected: usize, name: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let trips = world
        .app_state()
        .trips
        .all_trips(world.user().id)
        .await
        .expect("load trips");
    let matching = trips
        .iter()
        .filter(|trip| trip.start_stop_id.as_deref() == Some(stop_id.as_str()))
        .count();
    assert_eq!(matching, expected);
    assert!(trips
        .iter()
        .filter(|trip| trip.start_stop_id.is_some())
        .all(|trip| trip.start_stop_name.as_deref() == Some(name.as_str())));
}

#[then(regex = r#"^"([^"]+)" answers to "([^"]+)"$"#)]
async fn then_answers_to(world: &mut AppWorld, name: String, value: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let stop = world
        .app_state()
        .stops
        .get(&stop_id)
        .await
        .expect("load stop");
    assert!(stop.answers_to(&value));
}

#[then(regex = r"^(\d+) trips are verified$")]
async fn then_trips_verified(world: &mut AppWorld, expected: usize) {
    let trips = world
        .app_state()
        .trips
        .all_trips(world.user().id)
        .await
        .expect("load trips");
    assert_eq!(trips.iter().filter(|trip| trip.verified).count(), expected);
}

#[given(regex = r#"^the stop library has "([^"]+)" at (-?\d+\.\d+), (-?\d+\.\d+)$"#)]
async fn given_library_stop_at(world: &mut AppWorld, name: String, lat: f64, lng: f64) {
    world
        .app_state()
        .stops
        .create(NewStop {
            name,
            agency: "TTC".into(),
            lat: Some(lat),
            lng: Some(lng),
            ..NewStop::default()
        })
        .await
        .expect("create stop");
}

#[given(
    regex = r#"^a trip from "([^"]+)" to "([^"]+)" boarded at (-?\d+\.\d+), (-?\d+\.\d+)$"#
)]
async fn given_trip_with_boarding(
    world: &mut AppWorld,
    from: String,
    to: String,
    lat: f64,
    lng: f64,
) {
    let user_id = world.user().id;
    let trips = &world.app_state().trips;
    trips
        .start_trip(
            user_id,
            NewTrip {
                route: "505".into(),
                start_stop: from,
                boarding: GeoPoint::from_parts(Some(lat), Some(lng)),
                ..NewTrip::default()
            },
        )
        .await
        .expect("start trip");
    trips
        .end_trip(
            user_id,
            EndTrip {
                end_stop: to,
                exit: None,
            },
        )
        .await
        .expect("end trip");
}

async fn trip_ending_at(world: &AppWorld, end_stop: &str) -> Trip {
    world
        .app_state()
        .trips
        .all_trips(world.user().id)
        .await
        .expect("load trips")
        .into_iter()
        .find(|trip| trip.end_stop.as_deref().map(str::trim) == Some(end_stop))
        .expect("a trip with that end stop")
}

async fn active_trip(world: &AppWorld) -> Trip {
    world
        .app_state()
        .trips
        .active_trip(world.user().id)
        .await
        .expect("load active trip")
        .expect("an active trip")
}

fn assert_location(actual: Option<GeoPoint>, lat: f64, lng: f64) {
    let point = actual.expect("a location");
    assert!(
        (point.lat - lat).abs() < 1e-9 && (point.lng - lng).abs() < 1e-9,
        "location was {point:?}"
    );
}

#[then(regex = r#"^the trip to "([^"]+)" boarded at (-?\d+\.\d+), (-?\d+\.\d+)$"#)]
async fn then_trip_boarded_at(world: &mut AppWorld, end_stop: String, lat: f64, lng: f64) {
    let trip = trip_ending_at(world, &end_stop).await;
    assert_location(trip.boarding_location(), lat, lng);
}

#[then(regex = r#"^the trip to "([^"]+)" exited at (-?\d+\.\d+), (-?\d+\.\d+)$"#)]
async fn then_trip_exited_at(world: &mut AppWorld, end_stop: String, lat: f64, lng: f64) {
    let trip = trip_ending_at(world, &end_stop).await;
    assert_location(trip.exit_location(), lat, lng);
}

#[then(regex = r#"^the trip to "([^"]+)" has no exit location$"#)]
async fn then_trip_without_exit(world: &mut AppWorld, end_stop: String) {
    let trip = trip_ending_at(world, &end_stop).await;
    assert!(trip.exit_location().is_none());
}

#[then(regex = r#"^the trip to "([^"]+)" ended at the stop "([^"]+)"$"#)]
async fn then_trip_ended_at_stop(world: &mut AppWorld, end_stop: String, name: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let trip = trip_ending_at(world, &end_stop).await;
    assert_eq!(trip.end_stop_id.as_deref(), Some(stop_id.as_str()));
    assert_eq!(trip.end_stop_name.as_deref(), Some(name.as_str()));
}

#[then(regex = r#"^the trip to "([^"]+)" is (verified|unverified)$"#)]
async fn then_trip_verification(world: &mut AppWorld, end_stop: String, state: String) {
    let trip = trip_ending_at(world, &end_stop).await;
    assert_eq!(trip.verified, state == "verified");
}

#[then(regex = r"^the active trip boarded at (-?\d+\.\d+), (-?\d+\.\d+)$")]
async fn then_active_boarded_at(world: &mut AppWorld, lat: f64, lng: f64) {
    let trip = active_trip(world).await;
    assert_location(trip.boarding_location(), lat, lng);
}

#[then(regex = r"^the active trip is (verified|unverified)$")]
async fn then_active_verification(world: &mut AppWorld, state: String) {
    let trip = active_trip(world).await;
    assert_eq!(trip.verified, state == "verified");
}

#[given("the database rejects trip updates")]
async fn given_trip_updates_rejected(world: &mut AppWorld) {
    sqlx::query(
        r#"CREATE TRIGGER reject_trip_updates BEFORE UPDATE ON trips
           BEGIN SELECT RAISE(ABORT, 'trips are read-only'); END"#,
    )
    .execute(&world.app_state().db)
    .await
    .expect("create trigger");
}

#[then(regex = r#"^linking "([^"]+)" to the stop "([^"]+)" fails$"#)]
async fn then_link_fails(world: &mut AppWorld, value: String, name: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let result = world
        .app_state()
        .reconciler
        .link_value(world.user().id, &value, &stop_id)
        .await;
    assert!(result.is_err(), "link unexpectedly succeeded: {result:?}");
}

#[then(regex = r#"^creating the stop "([^"]+)" for "([^"]+)" fails$"#)]
async fn then_create_and_link_fails(world: &mut AppWorld, name: String, value: String) {
    let result = world
        .app_state()
        .reconciler
        .create_and_link(
            world.user().id,
            &value,
            NewStop {
                name,
                agency: "TTC".into(),
                ..NewStop::default()
            },
        )
        .await;
    assert!(result.is_err(), "create and link unexpectedly succeeded");
}

#[then(regex = r#"^"([^"]+)" does not answer to "([^"]+)"$"#)]
async fn then_does_not_answer_to(world: &mut AppWorld, name: String, value: String) {
    let stop_id = stop_id_by_name(world, &name).await;
    let stop = world
        .app_state()
        .stops
        .get(&stop_id)
        .await
        .expect("load stop");
    assert!(!stop.answers_to(&value), "aliases are {:?}", stop.aliases);
}

#[then(regex = r#"^the stop library has no stop named "([^"]+)"$"#)]
async fn then_no_stop_named(world: &mut AppWorld, name: String) {
    let stops = world.app_state().stops.list().await.expect("list stops");
    assert!(stops.iter().all(|stop| stop.name != name));
}

#[given(regex = r#"^the user saved the phone number "([^"]+)"$"#)]
async fn given_phone(world: &mut AppWorld, phone: String) {
    let user_id = world.user().id;
    world
        .app_state()
        .profiles
        .save(
            user_id,
            ProfileUpdate {
                sms_phone: Some(phone),
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect("save profile");
}

#[when(regex = r#"^"([^"]+)" texts "([^"]*)"$"#)]
async fn when_texts(world: &mut AppWorld, from: String, body: String) {
    let reply = world
        .app_state()
        .sms
        .handle(&from, &body)
        .await
        .expect("handle sms");
    world.last_reply = Some(reply);
}

#[then(regex = r#"^the reply contains "([^"]+)"$"#)]
async fn then_reply_contains(world: &mut AppWorld, expected: String) {
    let reply = world.last_reply.as_deref().expect("a reply");
    assert!(reply.contains(&expected), "reply was: {reply}");
}

#[then("the latest trip came in by sms")]
async fn then_latest_sms(world: &mut AppWorld) {
    let trip = world.latest_trip().await;
    assert_eq!(trip.source, TripSource::Sms);
    assert!(!trip.is_active());
}

#[when(regex = r#"^the webhook receives "([^"]+)" from "([^"]+)"$"#)]
async fn when_webhook(world: &mut AppWorld, body: String, from: String) {
    let form = format!(
        "From={}&Body={}",
        from.replace('+', "%2B"),
        body.replace(' ', "+")
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/sms")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .expect("request");
    world.call(request).await;
}

#[then("the webhook responds with a TwiML message")]
async fn then_twiml(world: &mut AppWorld) {
    let (status, content_type, body) = world.last_response.clone().expect("a response");
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/xml"));
    assert!(body.contains("<Response><Message>"), "body was: {body}");
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
