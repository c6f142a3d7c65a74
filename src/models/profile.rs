use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub name: String,
    pub emoji: String,
    pub default_agency: String,
    pub is_public: bool,
    pub sms_phone: Option<String>,
    pub sms_confirmed: bool,
}

impl Profile {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            name: String::new(),
            emoji: String::new(),
            default_agency: String::new(),
            is_public: false,
            sms_phone: None,
            sms_confirmed: false,
        }
    }

    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        if self.name.trim().is_empty() {
            username
        } else {
            self.name.trim()
        }
    }
}

/// Keeps `+` and digits so numbers typed with spaces or dashes match the
/// provider's `From` field.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .chars()
        .enumerate()
        .filter(|(idx, c)| c.is_ascii_digit() || (*idx == 0 && *c == '+'))
        .map(|(_, c)| c)
        .collect();
    if normalized.chars().filter(|c| c.is_ascii_digit()).count() < 5 {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_phone;

    #[test]
    fn phone_numbers_lose_punctuation() {
        assert_eq!(normalize_phone("+1 (416) 555-0100").as_deref(), Some("+14165550100"));
        assert_eq!(normalize_phone("416.555.0100").as_deref(), Some("4165550100"));
        assert_eq!(normalize_phone("12"), None);
        assert_eq!(normalize_phone(""), None);
    }
}
