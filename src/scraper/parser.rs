use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::config::ScraperConfig;
use crate::identity::normalize;
use crate::models::RawListing;
use crate::utils::error::{AppError, Result};

static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[£$€]\s?\d[\d,]*(?:\.\d{1,2})?").expect("price pattern is valid")
});

/// Turns a rendered page into raw listings.
///
/// The parser tells "confirmed empty" (`Ok(vec![])`) apart from "could not
/// find the listing region" (`Err(AppError::Extraction)`), so a layout change
/// is never mistaken for a sold-out page.
pub struct ListingParser {
    listing_selectors: Vec<(String, Selector)>,
    container: Selector,
    empty_marker: Selector,
    price: Selector,
    section: Selector,
}

impl ListingParser {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let listing_selectors = config
            .listing_selectors
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Ok((s.clone(), parse_selector(s)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            listing_selectors,
            container: parse_selector(&config.container_selector)?,
            empty_marker: parse_selector(&config.empty_selector)?,
            price: parse_selector(&config.price_selector)?,
            section: parse_selector(&config.section_selector)?,
        })
    }

    pub fn parse(&self, url: &str, html: &str) -> Result<Vec<RawListing>> {
        let document = Html::parse_document(html);

        if document.select(&self.empty_marker).any(|el| !is_hidden(el)) {
            tracing::debug!(url, "Page shows the no-listings marker");
            return Ok(Vec::new());
        }

        for (raw_selector, selector) in &self.listing_selectors {
            let elements: Vec<ElementRef> = document.select(selector).collect();
            if elements.is_empty() {
                continue;
            }

            let mut listings = Vec::with_capacity(elements.len());
            let mut anomalies = 0usize;
            for element in elements {
                match self.extract(element) {
                    Some(listing) => listings.push(listing),
                    None => {
                        anomalies += 1;
                        tracing::debug!(url, selector = %raw_selector, "Skipping listing with no readable text");
                    }
                }
            }

            if listings.is_empty() {
                return Err(AppError::extraction(
                    url,
                    format!("{} element(s) matched '{}' but none could be read", anomalies, raw_selector),
                ));
            }

            if anomalies > 0 {
                tracing::warn!(url, skipped = anomalies, kept = listings.len(), "Some listings could not be extracted");
            }

            tracing::debug!(url, selector = %raw_selector, count = listings.len(), "Extracted listings");
            return Ok(listings);
        }

        if document.select(&self.container).next().is_some() {
            tracing::debug!(url, "Listing container present but empty");
            return Ok(Vec::new());
        }

        Err(AppError::extraction(
            url,
            "neither listings, the listing container nor the no-listings marker were found",
        ))
    }

    fn extract(&self, element: ElementRef<'_>) -> Option<RawListing> {
        let text = element_text(element);
        if text.is_empty() {
            return None;
        }

        let price = element
            .select(&self.price)
            .map(element_text)
            .find(|p| !p.is_empty())
            .or_else(|| PRICE_TOKEN.find(&text).map(|m| m.as_str().to_string()))
            .unwrap_or_default();

        let section = element
            .select(&self.section)
            .map(element_text)
            .find(|s| !s.is_empty());

        Some(RawListing {
            text,
            price,
            section,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Validation(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize(&element.text().collect::<Vec<_>>().join(" "))
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    value
        .attr("style")
        .map(|style| style.replace(' ', "").to_ascii_lowercase().contains("display:none"))
        .unwrap_or(false)
}
