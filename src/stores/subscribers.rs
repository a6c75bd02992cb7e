use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::RwLock;

use super::write_json_atomic;
use crate::models::{Subscriber, normalize_email};
use crate::utils::error::{AppError, Result};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Basic `local@domain.tld` syntax check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Deduplicated, persisted list of recipients.
///
/// The in-memory list is authoritative. Every mutation rewrites the whole
/// file while holding the write lock; a failed write is logged and the
/// process carries on with the in-memory list.
pub struct SubscriberStore {
    path: PathBuf,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SubscriberStore {
    /// Load from `path`. A missing file is an empty list; a corrupt one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let subscribers = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice::<Vec<Subscriber>>(&bytes).map_err(|e| AppError::persistence(&path, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(AppError::persistence(&path, e)),
        };

        tracing::info!(path = %path.display(), count = subscribers.len(), "Loaded subscribers");
        Ok(Self {
            path,
            subscribers: RwLock::new(subscribers),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, subscribers: &[Subscriber]) {
        if let Err(e) = write_json_atomic(&self.path, subscribers).await {
            tracing::error!(path = %self.path.display(), "Subscriber list not persisted, continuing in memory: {}", e);
        }
    }

    pub async fn add(&self, email: &str, name: &str) -> Result<Subscriber> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::InvalidFormat { email });
        }

        let mut subscribers = self.subscribers.write().await;
        if subscribers.iter().any(|s| normalize_email(&s.email) == email) {
            return Err(AppError::DuplicateSubscriber { email });
        }

        let subscriber = Subscriber::new(email, name);
        subscribers.push(subscriber.clone());
        self.persist(&subscribers).await;

        tracing::info!(email = %subscriber.email, total = subscribers.len(), "Subscriber added");
        Ok(subscriber)
    }

    /// Returns whether a record was actually removed.
    pub async fn remove(&self, email: &str) -> bool {
        let email = normalize_email(email);
        let mut subscribers = self.subscribers.write().await;

        let before = subscribers.len();
        subscribers.retain(|s| normalize_email(&s.email) != email);
        let removed = subscribers.len() != before;

        if removed {
            self.persist(&subscribers).await;
            tracing::info!(email = %email, total = subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub async fn list(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
