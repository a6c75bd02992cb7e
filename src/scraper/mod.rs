//! Fetch collaborator: page backends, the shared parser, and the
//! [`ListingSource`] that turns raw page content into identified listings.

pub mod browser;
pub mod http;
pub mod parser;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

use crate::config::{FetchBackend, ScraperConfig};
use crate::identity::IdentityExtractor;
use crate::models::Listing;
use crate::plugins::traits::ListingFetcher;
use crate::utils::error::{AppError, Result};

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use parser::ListingParser;

/// Build the backend selected in the configuration.
pub fn build_fetcher(config: &ScraperConfig) -> Result<Arc<dyn ListingFetcher>> {
    let parser = Arc::new(ListingParser::new(config)?);

    let fetcher: Arc<dyn ListingFetcher> = match config.backend {
        FetchBackend::Http => Arc::new(HttpFetcher::new(config, parser)?),
        FetchBackend::Browser => Arc::new(BrowserFetcher::new(config.clone(), parser)),
    };

    tracing::info!(backend = fetcher.name(), "Configured listing fetcher");
    Ok(fetcher)
}

/// Fetch, retry and identify in one place, for the loop and one-off checks alike.
pub struct ListingSource {
    fetcher: Arc<dyn ListingFetcher>,
    identity: IdentityExtractor,
    url: String,
    retry_attempts: usize,
    retry_delay: Duration,
}

impl ListingSource {
    pub fn new(fetcher: Arc<dyn ListingFetcher>, url: impl Into<String>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            identity: IdentityExtractor::new(),
            url: url.into(),
            retry_attempts: config.retry_attempts as usize,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current listings in page order, one entry per distinct id.
    ///
    /// Recoverable failures are retried `retry_attempts` times; the final
    /// error is returned so the caller can skip its cycle.
    pub async fn current_listings(&self) -> Result<Vec<Listing>> {
        let strategy = FixedInterval::new(self.retry_delay).take(self.retry_attempts);

        let this = self;
        let raw = RetryIf::spawn(
            strategy,
            move || async move {
                let result = this.fetcher.fetch(&this.url).await;
                if let Err(e) = &result {
                    tracing::warn!(url = %this.url, backend = this.fetcher.name(), "Fetch attempt failed: {}", e);
                }
                result
            },
            |e: &AppError| e.is_recoverable_fetch(),
        )
        .await?;

        let mut seen = HashSet::with_capacity(raw.len());
        let listings: Vec<Listing> = raw
            .into_iter()
            .map(|r| self.identity.listing(r))
            .filter(|l| seen.insert(l.id.clone()))
            .collect();

        tracing::debug!(url = %self.url, count = listings.len(), "Fetched current listings");
        Ok(listings)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.fetcher.shutdown().await
    }
}
