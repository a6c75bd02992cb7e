use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinError, JoinSet};

use crate::config::AppConfig;
use crate::diff::DiffEngine;
use crate::models::{Listing, MonitorStatus, Subscriber};
use crate::monitor::{LoopContext, LoopSettings, LoopState, MonitorLoop};
use crate::notifications::NotificationScheduler;
use crate::plugins::notifiers::SmtpMailer;
use crate::plugins::traits::{ListingFetcher, Mailer};
use crate::scraper::{ListingSource, build_fetcher};
use crate::stores::{StatusStore, SubscriberStore};
use crate::utils::error::{AppError, Result};

/// Result of a one-off check. Produced without touching the known-set.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub checked_at: DateTime<Utc>,
    pub current: Vec<Listing>,
    /// Listings the running loop has not seen yet.
    pub unseen: Vec<Listing>,
    pub baselined: bool,
}

/// Owns the monitor lifecycle and everything it shares with one-off checks.
pub struct WatcherService {
    ctx: Arc<LoopContext>,
    monitor: MonitorLoop,
    background: Mutex<JoinSet<()>>,
}

impl WatcherService {
    /// Wire up the configured fetch backend and SMTP mailer.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = build_fetcher(&config.scraper)?;
        let mailer = Arc::new(SmtpMailer::new(&config.notifications.smtp)?);
        Self::new(config, fetcher, mailer).await
    }

    pub async fn new(
        config: &AppConfig,
        fetcher: Arc<dyn ListingFetcher>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        let monitor_config = &config.monitor;
        let subscribers = SubscriberStore::open(&config.storage.subscribers_path).await?;

        let ctx = Arc::new(LoopContext {
            source: Arc::new(ListingSource::new(fetcher, monitor_config.url.clone(), &config.scraper)),
            diff: Arc::new(RwLock::new(DiffEngine::new())),
            scheduler: Arc::new(NotificationScheduler::new(
                mailer,
                monitor_config.url.clone(),
                monitor_config.event_name.clone(),
            )),
            subscribers: Arc::new(subscribers),
            status: Arc::new(StatusStore::new(&config.storage.status_path)),
            settings: LoopSettings {
                interval: monitor_config.check_interval(),
                admin: monitor_config.admin(),
                first_dibs: monitor_config.first_dibs,
                first_dibs_delay: monitor_config.first_dibs_delay(),
            },
        });

        Ok(Self {
            monitor: MonitorLoop::new(Arc::clone(&ctx)),
            ctx,
            background: Mutex::new(JoinSet::new()),
        })
    }

    pub async fn start_monitoring(&self) -> bool {
        self.monitor.start().await
    }

    pub fn stop_monitoring(&self) -> bool {
        self.monitor.stop()
    }

    pub fn monitor_state(&self) -> LoopState {
        self.monitor.state()
    }

    /// Wait until a stopped (or failed) loop has written its final status.
    pub async fn wait_for_monitor(&self) {
        self.monitor.wait().await;
    }

    /// Enroll a subscriber and, in the background, tell them whether
    /// listings are up right now.
    pub async fn add_subscriber(&self, email: &str, name: &str) -> Result<Subscriber> {
        let subscriber = self.ctx.subscribers.add(email, name).await?;

        let source = Arc::clone(&self.ctx.source);
        let scheduler = Arc::clone(&self.ctx.scheduler);
        let welcomed = subscriber.clone();
        let mut background = self.background.lock().await;
        spawn_reaping(&mut background, async move {
            let current = match source.current_listings().await {
                Ok(listings) => Some(listings),
                Err(e) => {
                    tracing::warn!(email = %welcomed.email, "Welcome check failed, sending unverified welcome: {}", e);
                    None
                }
            };

            if let Err(e) = scheduler.send_welcome(&welcomed, current.as_deref()).await {
                tracing::error!(email = %welcomed.email, "Welcome not delivered: {}", e);
            }
        });

        Ok(subscriber)
    }

    /// [`WatcherService::add_subscriber`] flattened to a success flag and a
    /// user-facing message.
    pub async fn subscribe(&self, email: &str, name: &str) -> (bool, String) {
        match self.add_subscriber(email, name).await {
            Ok(_) => (true, "Successfully subscribed!".to_string()),
            Err(AppError::DuplicateSubscriber { .. }) => (false, "Email already subscribed".to_string()),
            Err(AppError::InvalidFormat { .. }) => (false, "Invalid email format".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }

    pub async fn remove_subscriber(&self, email: &str) -> bool {
        self.ctx.subscribers.remove(email).await
    }

    pub async fn list_subscribers(&self) -> Vec<Subscriber> {
        self.ctx.subscribers.list().await
    }

    pub async fn get_subscriber_count(&self) -> usize {
        self.ctx.subscribers.count().await
    }

    /// Persisted status with the live subscriber count.
    pub async fn get_status(&self) -> MonitorStatus {
        let mut status = self.ctx.status.load().await;
        status.subscriber_count = self.ctx.subscribers.count().await as u64;
        status
    }

    pub async fn check_now(&self) -> Result<CheckReport> {
        let checked_at = Utc::now();
        let current = self.ctx.source.current_listings().await?;

        let diff = self.ctx.diff.read().await;
        let unseen = diff.unseen_listings(&current);
        let baselined = diff.is_baselined();
        drop(diff);

        tracing::info!(current = current.len(), unseen = unseen.len(), "One-off check complete");
        Ok(CheckReport {
            checked_at,
            current,
            unseen,
            baselined,
        })
    }

    /// Forget the known-set so the loop's next successful check re-baselines,
    /// then look at the page once for display.
    pub async fn reset_baseline(&self) -> Result<CheckReport> {
        let forgotten = {
            let mut diff = self.ctx.diff.write().await;
            let count = diff.known_count();
            diff.reset();
            count
        };
        tracing::info!(forgotten, "Known listings cleared, next scheduled check re-baselines");

        self.check_now().await
    }

    /// Wait for every background welcome task spawned so far.
    pub async fn drain_background(&self) {
        let mut background = self.background.lock().await;
        while let Some(joined) = background.join_next().await {
            log_background_failure(joined);
        }
    }

    pub async fn shutdown(&self) {
        self.monitor.stop();
        self.monitor.wait().await;
        self.drain_background().await;

        if let Err(e) = self.ctx.source.shutdown().await {
            tracing::warn!("Fetcher shutdown failed: {}", e);
        }
        tracing::info!("Watcher service shut down");
    }
}

/// Collect every finished task in `set`, then spawn `task` onto it.
fn spawn_reaping<F>(set: &mut JoinSet<()>, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    while let Some(joined) = set.try_join_next() {
        log_background_failure(joined);
    }
    set.spawn(task);
}

fn log_background_failure(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Background task failed: {}", e);
    }
}
