use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::parser::ListingParser;
use crate::config::ScraperConfig;
use crate::models::RawListing;
use crate::plugins::traits::ListingFetcher;
use crate::utils::error::{AppError, Result};

// The loop decides when to check, so the session must outlive long intervals.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Headless Chrome backend for pages that build their listings client-side.
///
/// One browser session is shared by every caller. The session lives behind a
/// mutex, so the loop's fetch and any one-off fetch never drive it at the same
/// time. A session that fails a fetch is discarded and relaunched on the next
/// call.
pub struct BrowserFetcher {
    config: ScraperConfig,
    parser: Arc<ListingParser>,
    session: Mutex<Option<Arc<Browser>>>,
}

impl BrowserFetcher {
    pub fn new(config: ScraperConfig, parser: Arc<ListingParser>) -> Self {
        Self {
            config,
            parser,
            session: Mutex::new(None),
        }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--window-size=1920,1080"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-backgrounding-occluded-windows"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        Ok(launch_options)
    }

    async fn session(&self, url: &str, slot: &mut Option<Arc<Browser>>) -> Result<Arc<Browser>> {
        if let Some(browser) = slot.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let options = self.launch_options()?;
        let browser = tokio::task::spawn_blocking(move || Browser::new(options))
            .await
            .map_err(|e| AppError::fetch(url, format!("browser launch task failed: {}", e)))?
            .map_err(|e| AppError::fetch(url, format!("failed to launch browser: {}", e)))?;

        tracing::info!("Launched headless browser session");
        let browser = Arc::new(browser);
        *slot = Some(Arc::clone(&browser));
        Ok(browser)
    }

    fn load_page(
        browser: &Browser,
        url: &str,
        user_agent: &str,
        timeout: Duration,
        settle: Duration,
    ) -> Result<String> {
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::fetch(url, format!("failed to create tab: {}", e)))?;

        tab.set_default_timeout(timeout);
        tab.set_user_agent(user_agent, None, None)
            .map_err(|e| AppError::fetch(url, format!("failed to set user agent: {}", e)))?;

        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| AppError::fetch(url, format!("navigation failed: {}", e)))?;

        // Listings are rendered by scripts after the load event
        std::thread::sleep(settle);

        let html = tab
            .get_content()
            .map_err(|e| AppError::fetch(url, format!("failed to read page content: {}", e)));

        let _ = tab.close(true);
        html
    }
}

#[async_trait]
impl ListingFetcher for BrowserFetcher {
    fn name(&self) -> &str {
        "browser"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<RawListing>> {
        let html = {
            let mut slot = self.session.lock().await;
            let browser = self.session(url, &mut slot).await?;

            let target = url.to_string();
            let user_agent = self.config.user_agent.clone();
            let timeout = self.config.timeout();
            let settle = Duration::from_millis(self.config.settle_delay_ms);

            let loaded = tokio::task::spawn_blocking(move || {
                Self::load_page(&browser, &target, &user_agent, timeout, settle)
            })
            .await
            .map_err(|e| AppError::fetch(url, format!("page load task failed: {}", e)))
            .and_then(|loaded| loaded);

            if loaded.is_err() {
                tracing::warn!(url, "Discarding browser session after failed fetch");
                *slot = None;
            }
            loaded?
        };

        self.parser.parse(url, &html)
    }

    async fn shutdown(&self) -> Result<()> {
        // Dropping the last handle closes the Chrome process
        self.session.lock().await.take();
        Ok(())
    }
}
