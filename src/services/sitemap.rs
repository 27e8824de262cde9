// src/services/sitemap.rs

//! Sitemap resolver.
//!
//! Fetches a sitemap, decides whether it is an index or a page list, and
//! expands indexes recursively into a flat list of [`PageEntry`] values.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, PageEntry};
use crate::utils::http::Fetcher;
use crate::utils::resolve;

/// Parsed shape of a single sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
    /// `<urlset>` (or loose `<loc>` tags): page entries
    Pages(Vec<PageEntry>),
}

/// Raw values collected for one `<url>` element.
#[derive(Debug, Default)]
struct UrlRecord {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

/// Parse a sitemap document.
///
/// `base_url` resolves relative `<loc>` values; `today` feeds fallback
/// fingerprints.
pub fn parse_sitemap(xml: &str, base_url: &str, today: NaiveDate) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    let mut saw_index = false;
    let mut saw_urls = false;
    let mut child_sitemaps: Vec<String> = Vec::new();
    let mut records: Vec<UrlRecord> = Vec::new();
    let mut loose_locs: Vec<String> = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let position = reader.buffer_position();
                return Err(AppError::parse(base_url, format!("{e} at byte {position}")));
            }
        };

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                saw_root = true;
                match name.as_str() {
                    "sitemap" => saw_index = true,
                    "url" => {
                        saw_urls = true;
                        records.push(UrlRecord::default());
                    }
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                saw_root = true;
                match e.local_name().as_ref() {
                    b"sitemap" => saw_index = true,
                    b"url" => saw_urls = true,
                    _ => {}
                }
            }
            Event::Text(t) => {
                if !stack.is_empty() {
                    let value = t
                        .unescape()
                        .map_err(|e| AppError::parse(base_url, e))?;
                    text.push_str(&value);
                }
            }
            Event::CData(c) => {
                if !stack.is_empty() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(AppError::parse(base_url, "unexpected closing tag"));
                };
                let parent = stack.last().map(String::as_str);
                let value = text.trim();

                match (parent, name.as_str()) {
                    (Some("sitemap"), "loc") if !value.is_empty() => {
                        child_sitemaps.push(absolutize(base_url, value));
                    }
                    (Some("url"), field) => {
                        if let Some(record) = records.last_mut() {
                            let slot = match field {
                                "loc" => Some(&mut record.loc),
                                "lastmod" => Some(&mut record.lastmod),
                                "changefreq" => Some(&mut record.changefreq),
                                "priority" => Some(&mut record.priority),
                                _ => None,
                            };
                            if let Some(slot) = slot {
                                if !value.is_empty() {
                                    *slot = Some(value.to_string());
                                }
                            }
                        }
                    }
                    (_, "loc") if !value.is_empty() => {
                        loose_locs.push(absolutize(base_url, value));
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AppError::parse(base_url, "document has no root element"));
    }
    if let Some(open) = stack.last() {
        return Err(AppError::parse(
            base_url,
            format!("unexpected end of document inside <{open}>"),
        ));
    }

    if saw_index {
        return Ok(SitemapDocument::Index(child_sitemaps));
    }

    if saw_urls {
        let entries = records
            .into_iter()
            .filter_map(|record| {
                let loc = record.loc?;
                Some(PageEntry::from_sitemap(
                    absolutize(base_url, &loc),
                    record.lastmod.as_deref(),
                    record.changefreq.as_deref(),
                    record.priority.as_deref(),
                    today,
                ))
            })
            .collect();
        return Ok(SitemapDocument::Pages(entries));
    }

    let entries = loose_locs
        .into_iter()
        .map(|loc| PageEntry::from_sitemap(loc, None, None, None, today))
        .collect();
    Ok(SitemapDocument::Pages(entries))
}

/// Keep absolute locations verbatim, resolve relative ones against the sitemap.
fn absolutize(base_url: &str, loc: &str) -> String {
    if url::Url::parse(loc).is_ok() {
        loc.to_string()
    } else {
        resolve(base_url, loc)
    }
}

/// Result of resolving a sitemap tree.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSitemap {
    /// De-duplicated pages in document order
    pub pages: Vec<PageEntry>,
    /// Child sitemaps skipped because they could not be fetched or parsed
    pub failed_sitemaps: Vec<String>,
}

impl ResolvedSitemap {
    /// Whether part of the tree is missing from `pages`.
    pub fn is_partial(&self) -> bool {
        !self.failed_sitemaps.is_empty()
    }
}

/// Service expanding a sitemap tree into page entries.
pub struct SitemapResolver {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
}

impl SitemapResolver {
    /// Create a new resolver using the sitemap timeout from `config`.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_secs(config.sitemap_timeout_secs),
        }
    }

    /// Resolve `url` into a flat, de-duplicated list of pages.
    pub async fn resolve(&self, url: &str) -> Result<Vec<PageEntry>> {
        self.resolve_on(url, Local::now().date_naive()).await
    }

    /// Resolve using an explicit date for fallback fingerprints.
    pub async fn resolve_on(&self, url: &str, today: NaiveDate) -> Result<Vec<PageEntry>> {
        Ok(self.resolve_tree(url, today).await?.pages)
    }

    /// Resolve and also report child sitemaps that could not be read.
    ///
    /// Failure of the root document is returned; failures of child
    /// sitemaps only drop that child's subtree.
    pub async fn resolve_tree(&self, url: &str, today: NaiveDate) -> Result<ResolvedSitemap> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_pages: HashSet<String> = HashSet::new();
        let mut resolved = ResolvedSitemap::default();

        // Depth-first, children pushed in reverse to keep document order.
        let mut pending: Vec<String> = vec![url.to_string()];
        let mut is_root = true;

        while let Some(sitemap_url) = pending.pop() {
            if !visited.insert(sitemap_url.clone()) {
                log::debug!("Sitemap already resolved this run: {}", sitemap_url);
                continue;
            }

            let document = match self.fetch_document(&sitemap_url, today).await {
                Ok(document) => document,
                Err(e) if is_root => return Err(e),
                Err(e) => {
                    log::warn!("Skipping child sitemap {}: {}", sitemap_url, e);
                    resolved.failed_sitemaps.push(sitemap_url);
                    continue;
                }
            };
            is_root = false;

            match document {
                SitemapDocument::Index(children) => {
                    log::info!(
                        "Sitemap index {} lists {} child sitemaps",
                        sitemap_url,
                        children.len()
                    );
                    pending.extend(children.into_iter().rev());
                }
                SitemapDocument::Pages(entries) => {
                    log::info!("Sitemap {} lists {} pages", sitemap_url, entries.len());
                    for entry in entries {
                        if seen_pages.insert(entry.url.clone()) {
                            resolved.pages.push(entry);
                        }
                    }
                }
            }
        }

        log::info!("Resolved {} pages from {}", resolved.pages.len(), url);
        Ok(resolved)
    }

    async fn fetch_document(&self, url: &str, today: NaiveDate) -> Result<SitemapDocument> {
        let body = self.fetcher.fetch_text(url, self.timeout).await?;
        parse_sitemap(&body, url, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::testing::StaticFetcher;

    const BASE: &str = "https://example.com/sitemap.xml";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn urlset(urls: &[&str]) -> String {
        let body: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc><lastmod>2026-03-01</lastmod></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</urlset>"#
        )
    }

    fn index(children: &[&str]) -> String {
        let body: String = children
            .iter()
            .map(|u| format!("<sitemap><loc>{u}</loc></sitemap>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</sitemapindex>"#
        )
    }

    fn resolver(fetcher: Arc<StaticFetcher>) -> SitemapResolver {
        SitemapResolver::new(fetcher, &CrawlerConfig::default())
    }

    #[test]
    fn test_parse_urlset_fingerprints() {
        let xml = r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/a</loc>
    <lastmod>2026-03-01T08:00:00+00:00</lastmod>
    <image:image><image:loc>https://example.com/a.png</image:loc></image:image>
  </url>
  <url>
    <loc>https://example.com/b</loc>
    <changefreq>weekly</changefreq>
    <priority>0.8</priority>
  </url>
  <url><loc>/c?x=1&amp;y=2</loc></url>
  <url><lastmod>2026-01-01</lastmod></url>
</urlset>"#;

        let doc = parse_sitemap(xml, BASE, today()).unwrap();
        let SitemapDocument::Pages(pages) = doc else {
            panic!("expected pages");
        };
        assert_eq!(
            pages,
            vec![
                PageEntry::new("https://example.com/a", "2026-03-01T08:00:00+00:00"),
                PageEntry::new("https://example.com/b", "weekly_0.8_2026-03-14"),
                PageEntry::new("https://example.com/c?x=1&y=2", "2026-03-14"),
            ]
        );
    }

    #[test]
    fn test_parse_index() {
        let doc = parse_sitemap(
            &index(&["https://example.com/s1.xml", "https://example.com/s2.xml"]),
            BASE,
            today(),
        )
        .unwrap();
        assert_eq!(
            doc,
            SitemapDocument::Index(vec![
                "https://example.com/s1.xml".to_string(),
                "https://example.com/s2.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_loose_locs_fallback() {
        let xml = r#"<feed><entry><loc>https://example.com/x</loc></entry><loc>https://example.com/y</loc></feed>"#;
        let doc = parse_sitemap(xml, BASE, today()).unwrap();
        assert_eq!(
            doc,
            SitemapDocument::Pages(vec![
                PageEntry::new("https://example.com/x", "2026-03-14"),
                PageEntry::new("https://example.com/y", "2026-03-14"),
            ])
        );
    }

    #[test]
    fn test_parse_cdata_loc() {
        let xml = "<urlset><url><loc><![CDATA[https://example.com/cdata]]></loc></url></urlset>";
        let SitemapDocument::Pages(pages) = parse_sitemap(xml, BASE, today()).unwrap() else {
            panic!("expected pages");
        };
        assert_eq!(pages[0].url, "https://example.com/cdata");
    }

    #[test]
    fn test_parse_empty_urlset() {
        let doc = parse_sitemap("<urlset></urlset>", BASE, today()).unwrap();
        assert_eq!(doc, SitemapDocument::Pages(Vec::new()));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_sitemap("<urlset><url></urlset>", BASE, today()),
            Err(AppError::Parse { .. })
        ));
        assert!(matches!(
            parse_sitemap("<urlset><url><loc>x</loc>", BASE, today()),
            Err(AppError::Parse { .. })
        ));
        assert!(matches!(
            parse_sitemap("not xml at all", BASE, today()),
            Err(AppError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_index_recursion_without_duplicates() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert(
            BASE,
            index(&[
                "https://example.com/s1.xml",
                "https://example.com/s2.xml",
                "https://example.com/s1.xml",
            ]),
        );
        fetcher.insert(
            "https://example.com/s1.xml",
            urlset(&[
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
            ]),
        );
        fetcher.insert(
            "https://example.com/s2.xml",
            urlset(&[
                "https://example.com/4",
                "https://example.com/5",
                "https://example.com/6",
            ]),
        );

        let pages = resolver(Arc::clone(&fetcher))
            .resolve_on(BASE, today())
            .await
            .unwrap();

        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
                "https://example.com/4",
                "https://example.com/5",
                "https://example.com/6",
            ]
        );
        assert_eq!(fetcher.request_count("https://example.com/s1.xml"), 1);
    }

    #[tokio::test]
    async fn test_resolve_tolerates_cycles() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert(BASE, index(&["https://example.com/child.xml"]));
        fetcher.insert(
            "https://example.com/child.xml",
            index(&[BASE, "https://example.com/leaf.xml"]),
        );
        fetcher.insert(
            "https://example.com/leaf.xml",
            urlset(&["https://example.com/page"]),
        );

        let pages = resolver(fetcher).resolve_on(BASE, today()).await.unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_child_failure_keeps_siblings() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert(
            BASE,
            index(&[
                "https://example.com/missing.xml",
                "https://example.com/broken.xml",
                "https://example.com/ok.xml",
            ]),
        );
        fetcher.insert("https://example.com/broken.xml", "<urlset><url>");
        fetcher.insert(
            "https://example.com/ok.xml",
            urlset(&["https://example.com/a", "https://example.com/b"]),
        );

        let resolved = resolver(fetcher).resolve_tree(BASE, today()).await.unwrap();
        assert_eq!(resolved.pages.len(), 2);
        assert!(resolved.is_partial());
        assert_eq!(
            resolved.failed_sitemaps,
            vec![
                "https://example.com/missing.xml".to_string(),
                "https://example.com/broken.xml".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_root_failure_is_error() {
        let fetcher = Arc::new(StaticFetcher::new());
        let err = resolver(Arc::clone(&fetcher))
            .resolve_on(BASE, today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));

        fetcher.insert(BASE, "<urlset><url></urlset>");
        let err = resolver(fetcher).resolve_on(BASE, today()).await.unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
