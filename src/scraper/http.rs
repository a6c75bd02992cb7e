use async_trait::async_trait;
use std::sync::Arc;

use super::parser::ListingParser;
use crate::config::ScraperConfig;
use crate::models::RawListing;
use crate::plugins::traits::ListingFetcher;
use crate::utils::error::{AppError, Result};

/// Plain HTTP backend for pages that render their listings server-side.
pub struct HttpFetcher {
    client: reqwest::Client,
    parser: Arc<ListingParser>,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig, parser: Arc<ListingParser>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client, parser })
    }
}

#[async_trait]
impl ListingFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<RawListing>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| AppError::fetch(url, e))?;

        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;

        self.parser.parse(url, &body)
    }
}
