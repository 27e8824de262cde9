// src/pipeline/digest.rs

//! The digest pipeline.
//!
//! One run is one logical transaction: load the snapshot, resolve the
//! sitemap, diff, enrich, rank, commit the new snapshot, render.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{Config, DigestItem, PageEntry, Snapshot};
use crate::pipeline::diff::{DiffSummary, calculate_diff};
use crate::pipeline::format::{DigestFormatter, DigestMessage};
use crate::pipeline::rank::{rank, truncate};
use crate::services::{SitemapResolver, TitleEnricher};
use crate::storage::SnapshotStore;
use crate::utils::http::Fetcher;
use crate::utils;

/// Statistics of a single run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Pages listed by the sitemap tree
    pub total_pages: usize,
    /// Child sitemaps that could not be read
    pub failed_sitemaps: usize,
    pub diff: DiffSummary,
    /// Changed pages whose title was fetched
    pub enriched: usize,
    /// Changed pages beyond the enrichment ceiling
    pub skipped: usize,
    pub title_failures: usize,
    /// Whether the snapshot was replaced
    pub snapshot_written: bool,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct DigestOutcome {
    /// Ranked and truncated items shown in the digest
    pub items: Vec<DigestItem>,
    pub message: DigestMessage,
    pub stats: RunStats,
}

impl DigestOutcome {
    pub fn has_new_content(&self) -> bool {
        !self.items.is_empty()
    }

    /// Rendered digest text, or the "no new content" message.
    pub fn text(&self) -> String {
        self.message.render()
    }
}

/// The explicit pipeline object shared by every trigger.
pub struct DigestPipeline {
    sitemap_url: String,
    max_items: usize,
    resolver: SitemapResolver,
    enricher: TitleEnricher,
    formatter: DigestFormatter,
    store: Arc<dyn SnapshotStore>,
    run_lock: Mutex<()>,
}

impl DigestPipeline {
    /// Build a pipeline; fails with a configuration error if `config` is invalid.
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            sitemap_url: config.source.sitemap_url.trim().to_string(),
            max_items: config.digest.max_items,
            resolver: SitemapResolver::new(Arc::clone(&fetcher), &config.crawler),
            enricher: TitleEnricher::new(fetcher, &config.crawler),
            formatter: DigestFormatter::new(config.digest.interval_hours),
            store,
            run_lock: Mutex::new(()),
        })
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Run the pipeline once.
    pub async fn run(&self) -> Result<DigestOutcome> {
        self.run_on(Local::now().date_naive()).await
    }

    /// Run the pipeline with an explicit date for fallback fingerprints.
    ///
    /// Concurrent calls are serialized.
    pub async fn run_on(&self, today: NaiveDate) -> Result<DigestOutcome> {
        let _guard = self.run_lock.lock().await;
        let start_time = Utc::now();

        utils::log::header("Sitemap digest run");

        let previous = self.store.load().await;

        utils::log::step(1, 4, "Resolve - Expanding sitemap tree");
        let resolved = self.resolver.resolve_tree(&self.sitemap_url, today).await?;
        let partial = resolved.is_partial();
        let pages = resolved.pages;

        utils::log::step(2, 4, "Diff - Detecting new and changed pages");
        let diff = calculate_diff(&pages, &previous);
        if !diff.has_changes() {
            log::info!("No changes since the last run");
        }
        log::info!(
            "{} changed pages ({} added, {} updated, {} removed)",
            diff.changed.len(),
            diff.summary.added,
            diff.summary.updated,
            diff.summary.removed
        );

        utils::log::step(3, 4, "Enrich - Fetching page titles");
        let enriched = self.enricher.enrich_with_stats(&diff.changed).await;
        let enriched_count = enriched.items.len();

        utils::log::step(4, 4, "Rank - Ordering and saving snapshot");
        let items = truncate(rank(enriched.items), self.max_items);
        let snapshot_written = self.commit(&pages, &previous, partial).await;

        let message = self.formatter.build(&items, self.max_items, Local::now());

        let stats = RunStats {
            start_time,
            end_time: Utc::now(),
            total_pages: pages.len(),
            failed_sitemaps: resolved.failed_sitemaps.len(),
            diff: diff.summary,
            enriched: enriched_count,
            skipped: enriched.skipped,
            title_failures: enriched.failures,
            snapshot_written,
        };
        log_stats(&stats, items.len());

        Ok(DigestOutcome {
            items,
            message,
            stats,
        })
    }

    /// Replace the snapshot with every current fingerprint.
    ///
    /// When part of the tree could not be read (`partial`), previous
    /// fingerprints are carried forward so the unreadable pages are not
    /// reported as new once they come back.
    ///
    /// Returns whether a write happened. Write failures are logged only;
    /// the next run will report the same changes again.
    async fn commit(&self, pages: &[PageEntry], previous: &Snapshot, partial: bool) -> bool {
        if pages.is_empty() {
            log::warn!(
                "Sitemap listed no pages; keeping snapshot at {}",
                self.store.location()
            );
            return false;
        }

        let current = if partial {
            log::warn!("Sitemap tree only partially resolved; keeping previous fingerprints");
            let mut merged = previous.clone();
            for page in pages {
                merged.insert(page.url.clone(), page.fingerprint.clone());
            }
            merged
        } else {
            Snapshot::from_entries(pages)
        };
        if &current == previous {
            log::debug!("Snapshot unchanged");
            return false;
        }

        match self.store.save(&current).await {
            Ok(()) => {
                log::info!(
                    "Snapshot with {} pages saved to {}",
                    current.len(),
                    self.store.location()
                );
                true
            }
            Err(e) => {
                log::error!("{}", e);
                false
            }
        }
    }
}

fn log_stats(stats: &RunStats, shown: usize) {
    let elapsed = stats.end_time - stats.start_time;
    utils::log::summary(
        "Digest run",
        &[
            ("Pages in sitemap", stats.total_pages.to_string()),
            ("Unreadable sitemaps", stats.failed_sitemaps.to_string()),
            ("New", stats.diff.added.to_string()),
            ("Updated", stats.diff.updated.to_string()),
            ("Titles fetched", stats.enriched.to_string()),
            ("Title failures", stats.title_failures.to_string()),
            ("Beyond page limit", stats.skipped.to_string()),
            ("Shown in digest", shown.to_string()),
            ("Snapshot written", stats.snapshot_written.to_string()),
            ("Elapsed", format!("{} ms", elapsed.num_milliseconds())),
        ],
    );
}
