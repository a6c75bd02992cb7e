use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::write_json_atomic;
use crate::models::MonitorStatus;
use crate::utils::error::Result;

/// Persisted [`MonitorStatus`] snapshot. Never consulted by the diff engine.
pub struct StatusStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved snapshot, or the zero value when absent or unreadable.
    pub async fn load(&self) -> MonitorStatus {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return MonitorStatus::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Could not read status file: {}", e);
                return MonitorStatus::default();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "Ignoring unreadable status file: {}", e);
            MonitorStatus::default()
        })
    }

    pub async fn save(&self, status: &MonitorStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json_atomic(&self.path, status).await
    }
}
