//! Change detection between the resolved sitemap and the last snapshot.
//!
//! A page is reported when its URL is absent from the snapshot or its
//! fingerprint differs from the recorded one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{PageEntry, Snapshot};

/// Counts of changes, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// In current but not in the snapshot
    pub added: usize,
    /// In both with a different fingerprint
    pub updated: usize,
    /// In the snapshot but no longer listed
    pub removed: usize,
}

/// Changed entries plus their summary.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// New or changed entries in resolver order
    pub changed: Vec<PageEntry>,
    pub summary: DiffSummary,
}

impl DiffResult {
    /// Check if there are any new or changed pages.
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Return entries that are new or whose fingerprint changed.
///
/// Output order follows `current`.
pub fn diff(current: &[PageEntry], previous: &Snapshot) -> Vec<PageEntry> {
    current
        .iter()
        .filter(|entry| previous.fingerprint(&entry.url) != Some(entry.fingerprint.as_str()))
        .cloned()
        .collect()
}

/// Calculate the diff together with added/updated/removed counts.
pub fn calculate_diff(current: &[PageEntry], previous: &Snapshot) -> DiffResult {
    let changed = diff(current, previous);

    let added = changed
        .iter()
        .filter(|entry| previous.fingerprint(&entry.url).is_none())
        .count();

    let current_urls: HashSet<&str> = current.iter().map(|e| e.url.as_str()).collect();
    let removed = previous
        .iter()
        .filter(|(url, _)| !current_urls.contains(url))
        .count();

    DiffResult {
        summary: DiffSummary {
            added,
            updated: changed.len() - added,
            removed,
        },
        changed,
    }
}
