use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::{error::AppError, services::sms::twiml_message, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(webhook))
}

#[derive(Deserialize)]
struct WebhookQuery {
    token: Option<String>,
}

/// Field names as the telephony provider posts them.
#[derive(Deserialize)]
struct InboundSms {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

async fn webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    Form(sms): Form<InboundSms>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(expected) = &state.config.sms_webhook_token {
        if query.token.as_deref() != Some(expected.as_str()) {
            warn!("sms webhook called without a valid token");
            return Err(AppError::Forbidden);
        }
    }

    let reply = match state.sms.handle(&sms.from, &sms.body).await {
        Ok(reply) => reply,
        Err(AppError::BadRequest(message)) => message,
        Err(err) => return Err(err),
    };
    Ok((
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        twiml_message(&reply),
    ))
}
