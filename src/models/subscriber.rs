use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    /// Callers pass an already-normalized address.
    pub fn new(email: String, name: impl Into<String>) -> Self {
        Self {
            email,
            name: name.into().trim().to_string(),
            subscribed_at: Utc::now(),
        }
    }

    /// Name used in greetings.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "there" } else { &self.name }
    }
}

/// Trimmed, lowercased form used for every email comparison and for storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
