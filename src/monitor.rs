//! The scheduled check loop: fetch, diff, notify, record status, sleep.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::diff::{CheckMode, DiffEngine};
use crate::models::{Listing, MonitorStatus};
use crate::notifications::{NotificationBatch, NotificationScheduler};
use crate::scraper::ListingSource;
use crate::stores::{StatusStore, SubscriberStore};
use crate::utils::error::{AppError, Result};

/// Upper bound on how long a stop request can go unnoticed during a sleep.
const CANCEL_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub interval: Duration,
    pub admin: Option<String>,
    pub first_dibs: bool,
    pub first_dibs_delay: Duration,
}

/// Everything one run of the loop touches. Shared with the service, which
/// uses the same source and diff engine for one-off checks.
pub struct LoopContext {
    pub source: Arc<ListingSource>,
    pub diff: Arc<RwLock<DiffEngine>>,
    pub scheduler: Arc<NotificationScheduler>,
    pub subscribers: Arc<SubscriberStore>,
    pub status: Arc<StatusStore>,
    pub settings: LoopSettings,
}

pub struct MonitorLoop {
    ctx: Arc<LoopContext>,
    state: Arc<AtomicU8>,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorLoop {
    pub fn new(ctx: Arc<LoopContext>) -> Self {
        Self {
            ctx,
            state: Arc::new(AtomicU8::new(LoopState::Idle as u8)),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Start the loop in its own task. Returns `false` and does nothing when
    /// a loop is already active or still stopping.
    pub async fn start(&self) -> bool {
        // Held across the spawn so a run that ends at once cannot be
        // restarted before its handle is stored.
        let mut handle = self.handle.lock().await;

        if self
            .state
            .compare_exchange(
                LoopState::Idle as u8,
                LoopState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            tracing::warn!(state = ?self.state(), "Monitor already active, start ignored");
            return false;
        }

        self.cancel.store(false, Ordering::SeqCst);
        let ctx = Arc::clone(&self.ctx);
        let cancel = Arc::clone(&self.cancel);
        let state = Arc::clone(&self.state);

        *handle = Some(tokio::spawn(async move {
            run(ctx, cancel).await;
            state.store(LoopState::Idle as u8, Ordering::SeqCst);
        }));
        tracing::info!(url = self.ctx.source.url(), "Monitor started");
        true
    }

    /// Ask the loop to stop. It finishes the current sleep slice or in-flight
    /// notification first. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let stopping = self
            .state
            .compare_exchange(
                LoopState::Running as u8,
                LoopState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if stopping {
            self.cancel.store(true, Ordering::SeqCst);
            tracing::info!("Monitor stop requested");
        }
        stopping
    }

    /// Wait for the current run, if any, to exit and write its final status.
    pub async fn wait(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Monitor task ended abnormally: {}", e);
            }
        }
    }
}

async fn run(ctx: Arc<LoopContext>, cancel: Arc<AtomicBool>) {
    let mut status = ctx.status.load().await;
    status.is_running = true;
    status.last_error = None;
    status.subscriber_count = ctx.subscribers.count().await as u64;
    save_status(&ctx, &status).await;

    let outcome = AssertUnwindSafe(cycles(&ctx, &cancel, &mut status))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => tracing::info!("Monitor stopped"),
        Ok(Err(e)) => {
            tracing::error!("Monitor loop terminated: {}", e);
            status.last_error = Some(e.to_string());
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let e = AppError::FatalLoop { message };
            tracing::error!("Monitor loop terminated: {}", e);
            status.last_error = Some(e.to_string());
        }
    }

    if let Err(e) = ctx.source.shutdown().await {
        tracing::warn!("Fetcher shutdown failed: {}", e);
    }

    status.is_running = false;
    status.subscriber_count = ctx.subscribers.count().await as u64;
    save_status(&ctx, &status).await;
}

async fn cycles(ctx: &LoopContext, cancel: &AtomicBool, status: &mut MonitorStatus) -> Result<()> {
    while !cancel.load(Ordering::SeqCst) {
        cycle(ctx, status).await?;
        sleep_unless_cancelled(ctx.settings.interval, cancel).await;
    }
    Ok(())
}

async fn cycle(ctx: &LoopContext, status: &mut MonitorStatus) -> Result<()> {
    let checked_at = Utc::now();
    metrics::counter!("watcher_checks_total").increment(1);

    match ctx.source.current_listings().await {
        Err(e) if e.is_recoverable_fetch() => {
            metrics::counter!("watcher_check_failures_total").increment(1);
            tracing::warn!(url = ctx.source.url(), "Check skipped, known listings kept: {}", e);
            status.record_check(checked_at);
            status.last_error = Some(e.to_string());
        }
        Err(e) => {
            return Err(AppError::FatalLoop {
                message: e.to_string(),
            });
        }
        Ok(listings) => {
            metrics::gauge!("watcher_listings_current").set(listings.len() as f64);
            let new = ctx
                .diff
                .write()
                .await
                .new_listings(&listings, CheckMode::Scheduled);

            status.record_check(checked_at);
            status.last_error = None;
            tracing::info!(current = listings.len(), new = new.len(), "Check complete");

            if !new.is_empty() {
                status.record_found(new.len());
                metrics::counter!("watcher_listings_new_total").increment(new.len() as u64);
                notify(ctx, new).await;
            }
        }
    }

    status.is_running = true;
    status.subscriber_count = ctx.subscribers.count().await as u64;
    save_status(ctx, status).await;
    Ok(())
}

async fn notify(ctx: &LoopContext, new: Vec<Listing>) {
    let settings = &ctx.settings;
    let mut batch = NotificationBatch::new(new);
    if settings.first_dibs && settings.admin.is_some() {
        batch = batch.with_first_dibs(settings.first_dibs_delay);
    }

    let recipients = ctx.subscribers.list().await;
    if recipients.is_empty() && !batch.admin_first {
        tracing::info!("New listings found but nobody is subscribed");
        return;
    }

    let report = ctx
        .scheduler
        .notify(&batch, &recipients, settings.admin.as_deref())
        .await;

    metrics::counter!("watcher_notifications_sent_total").increment(report.sent as u64);
    metrics::counter!("watcher_notifications_failed_total").increment(report.failed as u64);
}

async fn save_status(ctx: &LoopContext, status: &MonitorStatus) {
    if let Err(e) = ctx.status.save(status).await {
        tracing::error!("Status not persisted: {}", e);
    }
}

async fn sleep_unless_cancelled(total: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !cancel.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep((deadline - now).min(CANCEL_POLL)).await;
    }
}
