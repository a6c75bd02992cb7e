use std::collections::HashSet;

use crate::models::{ContentHash, Listing};

/// Whether a check belongs to the scheduled loop or is a one-off look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Scheduled,
    OneOff,
}

impl CheckMode {
    pub fn is_one_off(self) -> bool {
        self == CheckMode::OneOff
    }
}

/// Holds the known-set and decides which listings are new.
///
/// Only scheduled checks write the known-set. Callers must not invoke
/// [`DiffEngine::check`] for a cycle whose fetch failed; skipping the call is
/// what preserves the previous known-set.
#[derive(Debug, Default)]
pub struct DiffEngine {
    known: HashSet<ContentHash>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known(&self) -> &HashSet<ContentHash> {
        &self.known
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn is_baselined(&self) -> bool {
        !self.known.is_empty()
    }

    /// Forget everything; the next scheduled check establishes a new baseline.
    pub fn reset(&mut self) {
        self.known.clear();
    }

    /// Ids in `current` that are not known, without touching state.
    pub fn unseen(&self, current: &HashSet<ContentHash>) -> Vec<ContentHash> {
        let mut ids: Vec<ContentHash> = current.difference(&self.known).cloned().collect();
        ids.sort();
        ids
    }

    pub fn check(&mut self, current: &HashSet<ContentHash>, mode: CheckMode) -> Vec<ContentHash> {
        if current.is_empty() {
            // Confirmed nothing listed: forget, so a reappearance counts as new.
            if !mode.is_one_off() {
                self.known.clear();
            }
            return Vec::new();
        }

        if self.known.is_empty() && !mode.is_one_off() {
            self.known = current.clone();
            tracing::info!(baseline = current.len(), "Established listing baseline");
            return Vec::new();
        }

        let new_ids = self.unseen(current);

        if !mode.is_one_off() {
            // (known ∪ new) ∩ current collapses to current
            self.known = current.clone();
        }

        new_ids
    }

    /// Listing-level wrapper around [`DiffEngine::check`] that keeps page order.
    pub fn new_listings(&mut self, listings: &[Listing], mode: CheckMode) -> Vec<Listing> {
        let current: HashSet<ContentHash> = listings.iter().map(|l| l.id.clone()).collect();
        let new_ids: HashSet<ContentHash> = self.check(&current, mode).into_iter().collect();
        listings
            .iter()
            .filter(|l| new_ids.contains(&l.id))
            .cloned()
            .collect()
    }

    /// Listing-level wrapper around [`DiffEngine::unseen`].
    pub fn unseen_listings(&self, listings: &[Listing]) -> Vec<Listing> {
        listings
            .iter()
            .filter(|l| !self.known.contains(&l.id))
            .cloned()
            .collect()
    }
}
