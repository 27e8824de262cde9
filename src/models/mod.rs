// src/models/mod.rs

//! Domain models for the digest pipeline.

mod config;
mod page;

pub use config::{
    Config, CrawlerConfig, DeliveryConfig, DigestConfig, LoggingConfig, MAX_INTERVAL_HOURS,
    SourceConfig, StorageConfig,
};
pub use page::{
    DEFAULT_PRIORITY, DigestItem, PageEntry, Snapshot, derive_fingerprint, fingerprint_priority,
};
