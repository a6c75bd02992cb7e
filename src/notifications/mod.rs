//! Staged delivery of new-listing alerts: an optional first-dibs pass to the
//! admin, a fixed delay, then the broadcast.

pub mod templates;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Listing, Subscriber, normalize_email};
use crate::plugins::traits::Mailer;
use crate::utils::error::{AppError, Result};
use templates::{RenderedMessage, TemplateContext};

/// New listings from one check, consumed once by [`NotificationScheduler::notify`].
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    pub listings: Vec<Listing>,
    pub admin_first: bool,
    pub delay: Duration,
    pub detected_at: DateTime<Utc>,
}

impl NotificationBatch {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            admin_first: false,
            delay: Duration::ZERO,
            detected_at: Utc::now(),
        }
    }

    pub fn with_first_dibs(mut self, delay: Duration) -> Self {
        self.admin_first = true;
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    pub failures: Vec<AppError>,
}

impl DeliveryReport {
    fn record(&mut self, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                self.failures.push(e);
            }
        }
    }
}

pub struct NotificationScheduler {
    mailer: Arc<dyn Mailer>,
    url: String,
    event_name: String,
}

impl NotificationScheduler {
    pub fn new(mailer: Arc<dyn Mailer>, url: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            mailer,
            url: url.into(),
            event_name: event_name.into(),
        }
    }

    fn context<'a>(&'a self, listings: &'a [Listing], at: DateTime<Utc>) -> TemplateContext<'a> {
        TemplateContext {
            event_name: &self.event_name,
            url: &self.url,
            listings,
            at,
        }
    }

    async fn deliver(&self, recipient: &str, message: &RenderedMessage) -> Result<()> {
        match self.mailer.send(recipient, &message.subject, &message.body).await {
            Ok(()) => {
                tracing::info!(recipient, "Notification sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(recipient, "Notification failed: {}", e);
                Err(e)
            }
        }
    }

    /// Send one batch. Every recipient gets exactly one attempt, and a failed
    /// send never stops the ones after it.
    ///
    /// With `admin_first` and an admin address, this call suspends for the
    /// batch delay between the admin send and the broadcast.
    pub async fn notify(
        &self,
        batch: &NotificationBatch,
        recipients: &[Subscriber],
        admin: Option<&str>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let ctx = self.context(&batch.listings, batch.detected_at);
        let admin = admin.map(normalize_email).filter(|a| !a.is_empty());

        let excluded = match (batch.admin_first, admin.as_deref()) {
            (true, Some(admin)) => {
                let message = templates::first_dibs(&ctx, batch.delay);
                report.record(self.deliver(admin, &message).await);

                tracing::info!(
                    delay_secs = batch.delay.as_secs(),
                    "First-dibs alert handled, holding broadcast"
                );
                tokio::time::sleep(batch.delay).await;
                Some(admin)
            }
            _ => None,
        };

        for subscriber in recipients {
            if excluded.is_some_and(|admin| normalize_email(&subscriber.email) == admin) {
                continue;
            }
            let message = templates::broadcast(&ctx, subscriber.display_name());
            report.record(self.deliver(&subscriber.email, &message).await);
        }

        tracing::info!(
            listings = batch.listings.len(),
            sent = report.sent,
            failed = report.failed,
            "Notification batch complete"
        );
        report
    }

    /// Welcome a new subscriber, listing what is up right now if anything is.
    ///
    /// `current` is `None` when the page could not be read; that welcome
    /// makes no claim about current listings.
    pub async fn send_welcome(&self, subscriber: &Subscriber, current: Option<&[Listing]>) -> Result<()> {
        let now = Utc::now();
        let name = subscriber.display_name();
        let message = match current {
            None => templates::welcome_unverified(&self.event_name, &self.url, name, now),
            Some([]) => templates::welcome(&self.event_name, &self.url, name, now),
            Some(listings) => templates::welcome_with_listings(&self.context(listings, now), name),
        };
        self.deliver(&subscriber.email, &message).await
    }
}
