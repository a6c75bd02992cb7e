use async_trait::async_trait;

use crate::models::RawListing;
use crate::utils::error::Result;

/// Trait for page fetch backends (plain HTTP, headless browser, ...).
///
/// An empty `Ok` means the page confirmed that nothing is listed. Anything the
/// backend could not establish must come back as an error so the caller keeps
/// its previous view of the page.
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<Vec<RawListing>>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
