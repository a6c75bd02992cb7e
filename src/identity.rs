//! Content-addressed listing identity.
//!
//! An id is a pure function of a listing's text and price: no counters, no
//! timestamps and no page position, so the same offer hashes to the same id
//! across checks and across process restarts.

use sha2::{Digest, Sha256};

use crate::models::{ContentHash, Listing, RawListing};

// Unit separator keeps ("ab", "c") and ("a", "bc") apart.
const FIELD_SEPARATOR: u8 = 0x1f;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityExtractor;

impl IdentityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn identify(&self, text: &str, price: &str) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(normalize(text).as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(normalize(price).as_bytes());
        ContentHash::from_digest(&hasher.finalize())
    }

    pub fn listing(&self, raw: RawListing) -> Listing {
        let text = normalize(&raw.text);
        let price = normalize(&raw.price);
        Listing {
            id: self.identify(&text, &price),
            text,
            price,
            section: raw.section.map(|s| normalize(&s)).filter(|s| !s.is_empty()),
        }
    }
}

/// Trims and collapses runs of whitespace. Casing is left alone.
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
