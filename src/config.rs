use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::stores::subscribers::is_valid_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub scraper: ScraperConfig,
    pub notifications: NotificationsConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub url: String,
    pub event_name: String,
    pub check_interval_secs: u64,
    pub admin_email: Option<String>,
    pub first_dibs: bool,
    pub first_dibs_delay_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    Http,
    Browser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub backend: FetchBackend,
    pub request_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
    pub listing_selectors: Vec<String>,
    pub container_selector: String,
    pub empty_selector: String,
    pub price_selector: String,
    pub section_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub subscribers_path: PathBuf,
    pub status_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn first_dibs_delay(&self) -> Duration {
        Duration::from_secs(self.first_dibs_delay_secs)
    }

    /// The admin address, normalized, if one is configured.
    pub fn admin(&self) -> Option<String> {
        self.admin_email
            .as_deref()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case outside development
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("WATCHER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scraper.listing_selectors")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("monitor.event_name", "Oasis")?
            .set_default("monitor.check_interval_secs", 30)?
            .set_default("monitor.first_dibs", true)?
            .set_default("monitor.first_dibs_delay_secs", 300)?
            .set_default("scraper.backend", "http")?
            .set_default("scraper.request_timeout", 30)?
            .set_default("scraper.retry_attempts", 1)?
            .set_default("scraper.retry_delay_ms", 2000)?
            .set_default("scraper.settle_delay_ms", 3000)?
            .set_default(
                "scraper.user_agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            )?
            .set_default(
                "scraper.listing_selectors",
                vec![
                    "#list div.listing",
                    "#list div.ticket",
                    "#list div.item",
                    "#list li",
                    "#list [data-testid*='listing']",
                ],
            )?
            .set_default("scraper.container_selector", "#list")?
            .set_default("scraper.empty_selector", "#no-listings-found")?
            .set_default("scraper.price_selector", "[class*='price']")?
            .set_default(
                "scraper.section_selector",
                "[class*='section'], [class*='seat'], [class*='block']",
            )?
            .set_default("notifications.smtp.host", "smtp.gmail.com")?
            .set_default("notifications.smtp.port", 587)?
            .set_default("notifications.smtp.from_name", "Ticket Watcher")?
            .set_default("notifications.smtp.use_tls", true)?
            .set_default("storage.subscribers_path", "data/subscribers.json")?
            .set_default("storage.status_path", "data/monitor_status.json")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8501)?
            .set_default("logging.level", "info")?
            .set_default("logging.file_prefix", "ticket_watcher.log")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9001)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.monitor.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => return Err(ConfigError::Message("Invalid monitor URL format".into())),
        }

        if self.monitor.check_interval_secs == 0 {
            return Err(ConfigError::Message("Monitor check_interval_secs must be greater than 0".into()));
        }

        if let Some(admin) = self.monitor.admin() {
            if !is_valid_email(&admin) {
                return Err(ConfigError::Message("Monitor admin_email is not a valid address".into()));
            }
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.listing_selectors.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Message("Scraper listing_selectors must not be empty".into()));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
