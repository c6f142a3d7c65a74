use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    /// Base for share links to public profiles.
    pub public_base_url: Url,
    /// When set, the SMS webhook only accepts requests carrying `?token=<value>`.
    pub sms_webhook_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tripbook.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-this-secret-signs-the-session-cookies".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{listen_addr}/"));
        let public_base_url = Url::parse(&public_base_url)
            .map_err(|err| AppError::Config(format!("invalid PUBLIC_BASE_URL: {err}")))?;

        let sms_webhook_token = env::var("SMS_WEBHOOK_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            public_base_url,
            sms_webhook_token,
        })
    }

    pub fn public_profile_url(&self, username: &str) -> String {
        self.public_base_url
            .join(&format!("u/{username}"))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("/u/{username}"))
    }
}
