//! Trip logging by text message.
//!
//! The telephony provider posts the sender number and message body; the
//! reply is returned as a TwiML document.

use tracing::{info, warn};

use crate::{
    error::AppError,
    models::{
        profile::normalize_phone,
        trip::{EndTrip, NewTrip, TripSource},
    },
    services::{profiles::ProfileStore, trips::TripStore},
};

pub const HELP_TEXT: &str = "Text \"[stop] [route]\" to start a trip, and \"[stop]\" plus any \
route to end it. STATUS shows your trip, CANCEL drops it, REGISTER links this number.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsCommand {
    Register,
    Help,
    Status,
    Cancel,
    Log { stop: String, route: String },
    Unknown(String),
}

impl SmsCommand {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        let mut words = body.split_whitespace();
        let first = words.next().unwrap_or_default();
        if words.next().is_none() {
            match first.to_ascii_uppercase().as_str() {
                "REGISTER" => return SmsCommand::Register,
                "HELP" | "?" => return SmsCommand::Help,
                "STATUS" => return SmsCommand::Status,
                "CANCEL" => return SmsCommand::Cancel,
                _ => {}
            }
        }

        match body.rsplit_once(char::is_whitespace) {
            Some((stop, route)) if !stop.trim().is_empty() && !route.is_empty() => {
                SmsCommand::Log {
                    stop: stop.trim().to_string(),
                    route: route.to_string(),
                }
            }
            _ => SmsCommand::Unknown(body.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct SmsService {
    profiles: ProfileStore,
    trips: TripStore,
}

impl SmsService {
    pub fn new(profiles: ProfileStore, trips: TripStore) -> Self {
        Self { profiles, trips }
    }

    /// Handles one inbound message and returns the reply text.
    pub async fn handle(&self, from: &str, body: &str) -> Result<String, AppError> {
        let Some(phone) = normalize_phone(from) else {
            warn!(from, "sms from unparseable number");
            return Ok("Sorry, we could not read your phone number.".into());
        };
        let Some(profile) = self.profiles.find_by_phone(&phone).await? else {
            info!(phone = %phone, "sms from unknown number");
            return Ok(
                "This number is not linked to an account. Add it on your profile page, then text REGISTER."
                    .into(),
            );
        };
        let user_id = profile.user_id;
        let command = SmsCommand::parse(body);

        if !profile.sms_confirmed && !matches!(command, SmsCommand::Register | SmsCommand::Help) {
            return Ok("Text REGISTER to confirm this number first.".into());
        }

        let reply = match command {
            SmsCommand::Register => {
                self.profiles.confirm_sms(user_id).await?;
                info!(user_id, "sms number confirmed");
                format!("You're all set! {HELP_TEXT}")
            }
            SmsCommand::Help => HELP_TEXT.to_string(),
            SmsCommand::Status => match self.trips.active_trip(user_id).await? {
                Some(trip) => format!(
                    "On route {} since {} from {}.",
                    trip.route,
                    trip.start_time
                        .with_timezone(&chrono::Local)
                        .format("%H:%M"),
                    trip.start_label()
                ),
                None => "No trip in progress.".into(),
            },
            SmsCommand::Cancel => {
                if self.trips.cancel_active(user_id).await? {
                    "Trip cancelled.".into()
                } else {
                    "No trip in progress.".into()
                }
            }
            SmsCommand::Log { stop, route } => {
                if self.trips.active_trip(user_id).await?.is_some() {
                    let trip = self
                        .trips
                        .end_trip(
                            user_id,
                            EndTrip {
                                end_stop: stop,
                                exit: None,
                            },
                        )
                        .await?;
                    format!(
                        "Trip ended at {} after {} min.",
                        trip.end_label().unwrap_or_default(),
                        trip.duration.unwrap_or(0)
                    )
                } else {
                    let trip = self
                        .trips
                        .start_trip(
                            user_id,
                            NewTrip {
                                route,
                                start_stop: stop,
                                boarding: None,
                                source: TripSource::Sms,
                            },
                        )
                        .await?;
                    format!(
                        "Trip started on route {} from {}. Text your stop when you get off.",
                        trip.route,
                        trip.start_label()
                    )
                }
            }
            SmsCommand::Unknown(_) => format!("Sorry, I didn't get that. {HELP_TEXT}"),
        };
        Ok(reply)
    }
}

pub fn twiml_message(reply: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(reply)
    )
}

fn xml_entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&apos;"),
        _ => None,
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match xml_entity(c) {
            Some(entity) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(SmsCommand::parse("help"), SmsCommand::Help);
        assert_eq!(SmsCommand::parse(" Status "), SmsCommand::Status);
        assert_eq!(SmsCommand::parse("CANCEL"), SmsCommand::Cancel);
        assert_eq!(SmsCommand::parse("register"), SmsCommand::Register);
    }

    #[test]
    fn last_word_is_the_route() {
        assert_eq!(
            SmsCommand::parse("King St West 504"),
            SmsCommand::Log {
                stop: "King St West".into(),
                route: "504".into()
            }
        );
        assert_eq!(
            SmsCommand::parse("6036 510"),
            SmsCommand::Log {
                stop: "6036".into(),
                route: "510".into()
            }
        );
    }

    #[test]
    fn stop_names_starting_with_keywords_are_logged() {
        for (body, stop, route) in [
            ("Status Quo Ave 7", "Status Quo Ave", "7"),
            ("Start St 504", "Start St", "504"),
            ("Help Ave 504", "Help Ave", "504"),
            ("Register Rd 7", "Register Rd", "7"),
            ("cancel 12", "cancel", "12"),
        ] {
            assert_eq!(
                SmsCommand::parse(body),
                SmsCommand::Log {
                    stop: stop.into(),
                    route: route.into()
                },
                "parsing {body:?}"
            );
        }
    }

    #[test]
    fn start_is_not_a_keyword() {
        assert_eq!(SmsCommand::parse("start"), SmsCommand::Unknown("start".into()));
    }

    #[test]
    fn single_words_are_not_understood() {
        assert_eq!(SmsCommand::parse("Union"), SmsCommand::Unknown("Union".into()));
        assert_eq!(SmsCommand::parse(""), SmsCommand::Unknown(String::new()));
    }

    #[test]
    fn replies_are_xml_escaped() {
        assert_eq!(
            twiml_message("King & <Bay>"),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>King &amp; &lt;Bay&gt;</Message></Response>"
        );
    }
}
