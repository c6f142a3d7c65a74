use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        profiles::ProfileStore, reconcile::Reconciler, sms::SmsService, stops::StopLibrary,
        templates::TemplateStore, trips::TripStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripStore,
    pub stops: StopLibrary,
    pub profiles: ProfileStore,
    pub templates: TemplateStore,
    pub reconciler: Reconciler,
    pub sms: SmsService,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        let stops = StopLibrary::new(db.clone());
        let trips = TripStore::new(db.clone(), stops.clone());
        let profiles = ProfileStore::new(db.clone());
        Self {
            templates: TemplateStore::new(db.clone()),
            reconciler: Reconciler::new(db.clone()),
            sms: SmsService::new(profiles.clone(), trips.clone()),
            config,
            db,
            trips,
            stops,
            profiles,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
