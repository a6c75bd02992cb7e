use super::*;
use std::sync::Arc;
use ticket_watcher::scraper::{HttpFetcher, ListingParser, ListingSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTINGS_PAGE: &str = r#"
<html><body>
  <div id="list">
    <div class="listing"><span class="section">Block 101</span> 2 seated tickets <span class="price">£150.00</span></div>
    <div class="listing">Standing, 1 ticket <span class="price">£95.00</span></div>
  </div>
</body></html>
"#;

fn http_fetcher(config: &AppConfig) -> anyhow::Result<HttpFetcher> {
    let parser = Arc::new(ListingParser::new(&config.scraper)?);
    Ok(HttpFetcher::new(&config.scraper, parser)?)
}

#[tokio::test]
async fn test_http_fetcher_parses_listings() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS_PAGE))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let fetcher = http_fetcher(&get_test_config(dir.path()))?;
    let listings = fetcher.fetch(&format!("{}/event", server.uri())).await?;

    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].price, "£150.00");
    assert_eq!(listings[0].section.as_deref(), Some("Block 101"));
    Ok(())
}

#[tokio::test]
async fn test_http_error_status_is_fetch_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let fetcher = http_fetcher(&get_test_config(dir.path()))?;
    let result = fetcher.fetch(&format!("{}/event", server.uri())).await;

    assert!(matches!(result, Err(AppError::Fetch { .. })));
    Ok(())
}

#[tokio::test]
async fn test_challenge_page_is_extraction_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Checking your browser</body></html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let fetcher = http_fetcher(&get_test_config(dir.path()))?;
    let result = fetcher.fetch(&server.uri()).await;

    assert!(matches!(result, Err(AppError::Extraction { .. })));
    Ok(())
}

#[tokio::test]
async fn test_listing_source_retries_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS_PAGE))
        .with_priority(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let mut config = get_test_config(dir.path());
    config.scraper.retry_attempts = 2;

    let fetcher = Arc::new(http_fetcher(&config)?);
    let source = ListingSource::new(fetcher, server.uri(), &config.scraper);
    let listings = source.current_listings().await?;

    assert_eq!(listings.len(), 2);
    assert_eq!(listings[1].text, "Standing, 1 ticket £95.00");
    Ok(())
}
