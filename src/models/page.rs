// src/models/page.rs

//! Page entries, digest items and the fingerprint snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Priority assumed when a fingerprint carries no numeric component.
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// Change frequency assumed when only `<priority>` is present.
pub const DEFAULT_CHANGEFREQ: &str = "daily";

/// Date layout used by fallback fingerprints.
const FINGERPRINT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A page listed in a sitemap together with its version fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    /// Absolute page URL
    pub url: String,

    /// Version identity derived from sitemap metadata
    pub fingerprint: String,
}

impl PageEntry {
    pub fn new(url: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Build an entry from the raw `<url>` child values of a sitemap.
    pub fn from_sitemap(
        url: impl Into<String>,
        lastmod: Option<&str>,
        changefreq: Option<&str>,
        priority: Option<&str>,
        today: NaiveDate,
    ) -> Self {
        Self::new(url, derive_fingerprint(lastmod, changefreq, priority, today))
    }

    /// Numeric priority encoded in the fingerprint.
    pub fn priority(&self) -> f64 {
        fingerprint_priority(&self.fingerprint)
    }
}

/// Derive a fingerprint from sitemap metadata.
///
/// Order of preference:
/// 1. `lastmod` as-is
/// 2. `{changefreq}_{priority}_{today}` when either hint is present
/// 3. `{today}`
///
/// Blank values count as absent.
pub fn derive_fingerprint(
    lastmod: Option<&str>,
    changefreq: Option<&str>,
    priority: Option<&str>,
    today: NaiveDate,
) -> String {
    fn non_blank(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }

    let date = today.format(FINGERPRINT_DATE_FORMAT).to_string();

    if let Some(lastmod) = non_blank(lastmod) {
        return lastmod.to_string();
    }

    match (non_blank(changefreq), non_blank(priority)) {
        (None, None) => date,
        (changefreq, priority) => format!(
            "{}_{}_{}",
            changefreq.unwrap_or(DEFAULT_CHANGEFREQ),
            priority.unwrap_or("0.5"),
            date
        ),
    }
}

/// Extract the priority component of a composite fingerprint.
///
/// Anything that is not a finite number in the second `_` slot yields
/// [`DEFAULT_PRIORITY`].
pub fn fingerprint_priority(fingerprint: &str) -> f64 {
    fingerprint
        .split('_')
        .nth(1)
        .and_then(|part| part.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
        .unwrap_or(DEFAULT_PRIORITY)
}

/// A changed page enriched with its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    pub url: String,
    pub title: String,
    pub fingerprint: String,
}

impl DigestItem {
    pub fn from_entry(entry: &PageEntry, title: impl Into<String>) -> Self {
        Self {
            url: entry.url.clone(),
            title: title.into(),
            fingerprint: entry.fingerprint.clone(),
        }
    }

    pub fn priority(&self) -> f64 {
        fingerprint_priority(&self.fingerprint)
    }
}

/// Last known fingerprint of every page, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pages: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot holding the fingerprint of every entry.
    ///
    /// A URL listed twice keeps its first fingerprint.
    pub fn from_entries(entries: &[PageEntry]) -> Self {
        let mut pages = BTreeMap::new();
        for entry in entries {
            pages
                .entry(entry.url.clone())
                .or_insert_with(|| entry.fingerprint.clone());
        }
        Self { pages }
    }

    pub fn fingerprint(&self, url: &str) -> Option<&str> {
        self.pages.get(url).map(String::as_str)
    }

    pub fn insert(&mut self, url: impl Into<String>, fingerprint: impl Into<String>) {
        self.pages.insert(url.into(), fingerprint.into());
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for Snapshot {
    fn from(pages: BTreeMap<String, String>) -> Self {
        Self { pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_fingerprint_prefers_lastmod() {
        let fp = derive_fingerprint(
            Some("2026-03-01T10:00:00+00:00"),
            Some("weekly"),
            Some("0.8"),
            today(),
        );
        assert_eq!(fp, "2026-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_fingerprint_composite() {
        assert_eq!(
            derive_fingerprint(None, Some("weekly"), Some("0.8"), today()),
            "weekly_0.8_2026-03-14"
        );
        assert_eq!(
            derive_fingerprint(None, None, Some("0.3"), today()),
            "daily_0.3_2026-03-14"
        );
        assert_eq!(
            derive_fingerprint(None, Some("monthly"), None, today()),
            "monthly_0.5_2026-03-14"
        );
    }

    #[test]
    fn test_fingerprint_blank_tags_are_absent() {
        assert_eq!(
            derive_fingerprint(Some("  "), Some(""), None, today()),
            "2026-03-14"
        );
    }

    #[test]
    fn test_priority_extraction() {
        assert_eq!(fingerprint_priority("weekly_0.9_2026-03-14"), 0.9);
        assert_eq!(fingerprint_priority("2026-03-01"), DEFAULT_PRIORITY);
        assert_eq!(fingerprint_priority("daily_high_2026-03-14"), DEFAULT_PRIORITY);
        assert_eq!(fingerprint_priority("daily_NaN_2026-03-14"), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_snapshot_from_entries_keeps_first() {
        let snapshot = Snapshot::from_entries(&[
            PageEntry::new("https://example.com/a", "1"),
            PageEntry::new("https://example.com/a", "2"),
            PageEntry::new("https://example.com/b", "3"),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.fingerprint("https://example.com/a"), Some("1"));
    }

    #[test]
    fn test_snapshot_serializes_as_plain_map() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("https://example.com/a", "2026-01-01");
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"https://example.com/a":"2026-01-01"}"#);
    }
}
