//! Service layer for the digest pipeline.
//!
//! This module contains the network-facing stages:
//! - Sitemap resolution (`SitemapResolver`)
//! - Page title enrichment (`TitleEnricher`)

mod sitemap;
mod titles;

pub use sitemap::{ResolvedSitemap, SitemapDocument, SitemapResolver, parse_sitemap};
pub use titles::{EnrichOutcome, TITLE_UNAVAILABLE, TitleEnricher, UNTITLED, extract_title};
