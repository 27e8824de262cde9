// src/services/titles.rs

//! Title enricher service.
//!
//! Fetches changed pages and extracts a human-readable title for each.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, DigestItem, PageEntry};
use crate::utils::http::Fetcher;
use crate::utils::normalize_whitespace;

/// Title used when a page has neither `<title>` nor `<h1>`.
pub const UNTITLED: &str = "Untitled";

/// Title used when a page could not be fetched.
pub const TITLE_UNAVAILABLE: &str = "Title unavailable";

/// Summary of an enrichment pass.
#[derive(Debug, Default)]
pub struct EnrichOutcome {
    pub items: Vec<DigestItem>,
    /// Entries beyond the page ceiling, not fetched this run
    pub skipped: usize,
    pub failures: usize,
}

/// Service for fetching page titles with bounded concurrency.
pub struct TitleEnricher {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    delay: Duration,
    max_pages: usize,
    concurrency: usize,
}

impl TitleEnricher {
    /// Create a new enricher with the given configuration.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_secs(config.timeout_secs),
            delay: Duration::from_millis(config.request_delay_ms),
            max_pages: config.max_pages,
            concurrency: config.max_concurrent.max(1),
        }
    }

    /// Enrich at most `max_pages` entries; output keeps input order.
    pub async fn enrich(&self, entries: &[PageEntry]) -> Vec<DigestItem> {
        self.enrich_with_stats(entries).await.items
    }

    /// Same as [`enrich`](Self::enrich) but also reports skips and failures.
    pub async fn enrich_with_stats(&self, entries: &[PageEntry]) -> EnrichOutcome {
        let take = entries.len().min(self.max_pages);
        let mut outcome = EnrichOutcome {
            skipped: entries.len() - take,
            ..EnrichOutcome::default()
        };

        if outcome.skipped > 0 {
            log::info!(
                "Fetching titles for {} of {} changed pages (limit {})",
                take,
                entries.len(),
                self.max_pages
            );
        }

        let mut titles = stream::iter(entries[..take].iter().cloned())
            .map(|entry| async move {
                let title = self.fetch_title(&entry.url).await;
                (entry, title)
            })
            .buffered(self.concurrency);

        while let Some((entry, result)) = titles.next().await {
            let title = match result {
                Ok(title) => title,
                Err(error) => {
                    outcome.failures += 1;
                    log::warn!("Failed to fetch title for {}: {}", entry.url, error);
                    TITLE_UNAVAILABLE.to_string()
                }
            };
            outcome.items.push(DigestItem::from_entry(&entry, title));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        outcome
    }

    async fn fetch_title(&self, url: &str) -> Result<String> {
        let html = self.fetcher.fetch_text(url, self.timeout).await?;
        let document = Html::parse_document(&html);
        Ok(extract_title(&document)?.unwrap_or_else(|| UNTITLED.to_string()))
    }
}

/// Extract the `<title>` text, falling back to the first `<h1>`.
///
/// Returns `Ok(None)` when neither yields non-blank text.
pub fn extract_title(document: &Html) -> Result<Option<String>> {
    for css in ["title", "h1"] {
        let selector = parse_selector(css)?;
        if let Some(element) = document.select(&selector).next() {
            let text = normalize_whitespace(&element.text().collect::<String>());
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::parse(format!("selector '{s}'"), format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::testing::StaticFetcher;

    fn title_of(html: &str) -> Option<String> {
        extract_title(&Html::parse_document(html)).unwrap()
    }

    #[test]
    fn test_extract_title_tag() {
        assert_eq!(
            title_of("<html><head><title>  Hello\n  World </title></head><body><h1>H</h1></body></html>"),
            Some("Hello World".to_string())
        );
    }

    #[test]
    fn test_extract_h1_fallback() {
        assert_eq!(
            title_of("<html><head><title>   </title></head><body><h1>Big <b>News</b></h1><h1>Other</h1></body></html>"),
            Some("Big News".to_string())
        );
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(title_of("<html><body><p>text</p></body></html>"), None);
    }

    #[tokio::test]
    async fn test_enrich_isolates_failures_and_keeps_order() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert("https://example.com/a", "<title>A</title>");
        fetcher.insert("https://example.com/c", "<p>no heading</p>");

        let entries = vec![
            PageEntry::new("https://example.com/a", "1"),
            PageEntry::new("https://example.com/b", "2"),
            PageEntry::new("https://example.com/c", "3"),
        ];

        let enricher = TitleEnricher::new(fetcher, &CrawlerConfig::default());
        let outcome = enricher.enrich_with_stats(&entries).await;

        let titles: Vec<&str> = outcome.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", TITLE_UNAVAILABLE, UNTITLED]);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.items[1].fingerprint, "2");
    }

    #[tokio::test]
    async fn test_enrich_respects_page_ceiling() {
        let fetcher = Arc::new(StaticFetcher::new());
        let entries: Vec<PageEntry> = (0..5)
            .map(|i| {
                let url = format!("https://example.com/{i}");
                fetcher.insert(&url, format!("<title>Page {i}</title>"));
                PageEntry::new(url, "fp")
            })
            .collect();

        let config = CrawlerConfig {
            max_pages: 3,
            ..CrawlerConfig::default()
        };
        let enricher = TitleEnricher::new(Arc::clone(&fetcher) as Arc<dyn Fetcher>, &config);
        let items = enricher.enrich(&entries).await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[2].title, "Page 2");
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_enrich_runs_on_spawned_task() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert("https://example.com/a", "<title>A</title>");
        let enricher = TitleEnricher::new(fetcher, &CrawlerConfig::default());
        let entries = vec![PageEntry::new("https://example.com/a", "1")];

        let items = tokio::spawn(async move { enricher.enrich(&entries).await })
            .await
            .unwrap();
        assert_eq!(items[0].title, "A");
    }
}
