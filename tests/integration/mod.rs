// Integration tests for Ticket Watcher
// These tests drive the service, the monitor loop and the HTTP surface
// against scripted pages and a recording mailer.

pub mod fetcher_tests;
pub mod subscriber_tests;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request},
};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use ticket_watcher::{
    AppConfig, AppError, Result, WatcherService,
    config::{
        FetchBackend, LoggingConfig, MetricsConfig, MonitorConfig, NotificationsConfig, ScraperConfig,
        ServerConfig, SmtpConfig, StorageConfig,
    },
    models::{RawListing, Subscriber},
    plugins::{ListingFetcher, Mailer},
};
use tokio::time::Instant;
use tower::ServiceExt;

pub const EVENT_URL: &str = "https://tickets.example.com/event/oasis";

/// Test configuration rooted in `dir`.
pub fn get_test_config(dir: &Path) -> AppConfig {
    AppConfig {
        monitor: MonitorConfig {
            url: EVENT_URL.to_string(),
            event_name: "Oasis".to_string(),
            check_interval_secs: 30,
            admin_email: None,
            first_dibs: false,
            first_dibs_delay_secs: 300,
        },
        scraper: ScraperConfig {
            backend: FetchBackend::Http,
            request_timeout: 5,
            retry_attempts: 0,
            retry_delay_ms: 10,
            settle_delay_ms: 0,
            user_agent: "TicketWatcher-Test/1.0".to_string(),
            chrome_path: None,
            listing_selectors: vec!["#list div.listing".to_string()],
            container_selector: "#list".to_string(),
            empty_selector: "#no-listings-found".to_string(),
            price_selector: "[class*='price']".to_string(),
            section_selector: "[class*='section']".to_string(),
        },
        notifications: NotificationsConfig {
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 2525,
                username: None,
                password: None,
                from_address: Some("watcher@example.com".to_string()),
                from_name: "Ticket Watcher Test".to_string(),
                use_tls: false,
            },
        },
        storage: StorageConfig {
            subscribers_path: dir.join("subscribers.json"),
            status_path: dir.join("monitor_status.json"),
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8501,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            directory: None,
            file_prefix: "ticket_watcher.log".to_string(),
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
    }
}

pub fn listing(text: &str) -> RawListing {
    RawListing::new(text, "£100.00")
}

pub fn page(texts: &[&str]) -> Step {
    Step::Listings(texts.iter().map(|t| listing(t)).collect())
}

/// One scripted response of the fake page.
#[derive(Debug, Clone)]
pub enum Step {
    Listings(Vec<RawListing>),
    Fail,
    Fatal,
    Panic,
}

/// Plays back a script, one step per fetch. The last step repeats forever.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<RawListing>> {
        let step = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(Step::Listings(Vec::new()))
            }
        };
        self.calls.fetch_add(1, Ordering::SeqCst);

        match step {
            Step::Listings(listings) => Ok(listings),
            Step::Fail => Err(AppError::fetch(url, "scripted outage")),
            Step::Fatal => Err(AppError::Internal("scripted fatal error".to_string())),
            Step::Panic => panic!("scripted panic in fetch"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub at: Instant,
}

/// Records every send; addresses in `failing` are rejected.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.recipient == recipient)
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(recipient) {
            return Err(AppError::delivery(recipient, "scripted rejection"));
        }

        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }
}

/// A service wired to a scripted page and a recording mailer in a temp dir.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: AppConfig,
    pub fetcher: Arc<ScriptedFetcher>,
    pub mailer: Arc<RecordingMailer>,
    pub service: Arc<WatcherService>,
}

impl TestHarness {
    pub async fn new(script: Vec<Step>) -> anyhow::Result<Self> {
        Self::build(script, &[], |_| {}).await
    }

    /// `subscribers` are written to disk before the service starts, so no
    /// welcome check consumes a script step.
    pub async fn build(
        script: Vec<Step>,
        subscribers: &[&str],
        tweak: impl FnOnce(&mut AppConfig),
    ) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = get_test_config(dir.path());
        tweak(&mut config);

        if !subscribers.is_empty() {
            let seeded: Vec<Subscriber> = subscribers
                .iter()
                .map(|email| Subscriber::new(email.to_string(), ""))
                .collect();
            std::fs::write(&config.storage.subscribers_path, serde_json::to_vec(&seeded)?)?;
        }

        let fetcher = ScriptedFetcher::new(script);
        let mailer = RecordingMailer::new();
        let service = WatcherService::new(&config, fetcher.clone(), mailer.clone()).await?;

        Ok(Self {
            dir,
            config,
            fetcher,
            mailer,
            service: Arc::new(service),
        })
    }

    pub fn router(&self) -> Router {
        ticket_watcher::web::create_router(ticket_watcher::web::AppState {
            service: Arc::clone(&self.service),
        })
    }
}

/// Helper to make HTTP requests to the test app
pub async fn make_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<(axum::http::StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);

    if body.is_some() {
        request = request.header("content-type", "application/json");
    }

    let request = request.body(match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    })?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, json))
}

/// Helper to wait for async operations, measured on the tokio clock.
pub async fn wait_for_condition<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    condition()
}
