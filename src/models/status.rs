use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record of loop activity, read by external observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub last_check_at: Option<DateTime<Utc>>,
    pub total_checks: u64,
    pub tickets_found: u64,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MonitorStatus {
    pub fn record_check(&mut self, at: DateTime<Utc>) {
        self.total_checks = self.total_checks.saturating_add(1);
        self.last_check_at = Some(at);
    }

    pub fn record_found(&mut self, count: usize) {
        self.tickets_found = self.tickets_found.saturating_add(count as u64);
    }
}
