use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub agency: String,
    pub direction: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub aliases: Vec<String>,
}

impl Stop {
    /// True when `value` already resolves to this stop by name, code or alias.
    pub fn answers_to(&self, value: &str) -> bool {
        let value = value.trim();
        !value.is_empty()
            && (self.name == value
                || self.code.as_deref() == Some(value)
                || self.aliases.iter().any(|alias| alias == value))
    }

    pub fn label(&self) -> String {
        match (&self.code, &self.direction) {
            (Some(code), Some(direction)) => format!("{} ({code}, {direction})", self.name),
            (Some(code), None) => format!("{} ({code})", self.name),
            (None, Some(direction)) => format!("{} ({direction})", self.name),
            (None, None) => self.name.clone(),
        }
    }
}

/// Row shape of the `stops` table; aliases live in `stop_aliases`.
#[derive(Debug, Clone, FromRow)]
pub struct StopRow {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub agency: String,
    pub direction: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl StopRow {
    pub fn with_aliases(self, aliases: Vec<String>) -> Stop {
        Stop {
            id: self.id,
            name: self.name,
            code: self.code,
            agency: self.agency,
            direction: self.direction,
            lat: self.lat,
            lng: self.lng,
            aliases,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewStop {
    pub name: String,
    pub code: Option<String>,
    pub agency: String,
    pub direction: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopValue {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// Splits a free-text stop entry into a stop code (all digits) or a stop name.
pub fn categorize_stop_value(value: &str) -> StopValue {
    let value = value.trim();
    if value.is_empty() {
        return StopValue::default();
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        StopValue {
            code: Some(value.to_string()),
            name: None,
        }
    } else {
        StopValue {
            code: None,
            name: Some(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_are_codes() {
        assert_eq!(
            categorize_stop_value("6036"),
            StopValue {
                code: Some("6036".into()),
                name: None
            }
        );
        assert_eq!(
            categorize_stop_value("  6036 ").code.as_deref(),
            Some("6036")
        );
    }

    #[test]
    fn other_values_are_names() {
        assert_eq!(
            categorize_stop_value("King St"),
            StopValue {
                code: None,
                name: Some("King St".into())
            }
        );
        assert_eq!(
            categorize_stop_value("60A").name.as_deref(),
            Some("60A")
        );
    }

    #[test]
    fn blank_values_are_neither() {
        assert_eq!(categorize_stop_value("   "), StopValue::default());
    }

    #[test]
    fn answers_to_name_code_and_alias() {
        let stop = Stop {
            id: "s1".into(),
            name: "King St West".into(),
            code: Some("6036".into()),
            agency: "TTC".into(),
            direction: None,
            lat: None,
            lng: None,
            aliases: vec!["king west".into()],
        };
        assert!(stop.answers_to("King St West"));
        assert!(stop.answers_to(" 6036"));
        assert!(stop.answers_to("king west"));
        assert!(!stop.answers_to("King St"));
        assert!(!stop.answers_to(""));
    }
}
