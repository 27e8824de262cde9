//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound for `digest.interval_hours` (one year).
pub const MAX_INTERVAL_HOURS: u64 = 24 * 366;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the sitemap lives
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Digest size, cadence and destination
    #[serde(default)]
    pub digest: DigestConfig,

    /// Outbound message limits
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// Recognized: `SITEMAP_URL`, `DIGEST_CHAT_ID`, `MAX_ARTICLES_IN_DIGEST`,
    /// `DIGEST_INTERVAL_HOURS`, `ADMIN_ID`, `SNAPSHOT_PATH`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("SITEMAP_URL") {
            self.source.sitemap_url = url.trim().to_string();
        }

        if let Some(chat) = get("DIGEST_CHAT_ID") {
            self.digest.channel = Some(chat.trim().to_string());
        }

        if let Some(max) = get("MAX_ARTICLES_IN_DIGEST") {
            match max.trim().parse() {
                Ok(n) => self.digest.max_items = n,
                Err(_) => log::warn!("Ignoring invalid MAX_ARTICLES_IN_DIGEST: {}", max),
            }
        }

        if let Some(hours) = get("DIGEST_INTERVAL_HOURS") {
            match hours.trim().parse() {
                Ok(n) => self.digest.interval_hours = n,
                Err(_) => log::warn!("Ignoring invalid DIGEST_INTERVAL_HOURS: {}", hours),
            }
        }

        if let Some(admin) = get("ADMIN_ID") {
            self.digest.admin_id = Some(admin.trim().to_string());
        }

        if let Some(path) = get("SNAPSHOT_PATH") {
            self.storage.snapshot_path = PathBuf::from(path.trim());
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let sitemap_url = self.source.sitemap_url.trim();
        if sitemap_url.is_empty() {
            return Err(AppError::config(
                "source.sitemap_url is not set (or SITEMAP_URL)",
            ));
        }
        let parsed = url::Url::parse(sitemap_url).map_err(|e| {
            AppError::config(format!("source.sitemap_url is not a valid URL: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::config(
                "source.sitemap_url must be an http(s) URL",
            ));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.sitemap_timeout_secs == 0 {
            return Err(AppError::config("crawler.sitemap_timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::config("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::config("crawler.max_pages must be > 0"));
        }
        if self.digest.max_items == 0 {
            return Err(AppError::config("digest.max_items must be > 0"));
        }
        if self.digest.interval_hours == 0 {
            return Err(AppError::config("digest.interval_hours must be > 0"));
        }
        if self.digest.interval_hours > MAX_INTERVAL_HOURS {
            return Err(AppError::config(format!(
                "digest.interval_hours must be <= {}",
                MAX_INTERVAL_HOURS
            )));
        }
        if self.delivery.max_items_per_message == 0 {
            return Err(AppError::config(
                "delivery.max_items_per_message must be > 0",
            ));
        }
        if self.delivery.max_message_chars < defaults::MIN_MESSAGE_CHARS {
            return Err(AppError::config(format!(
                "delivery.max_message_chars must be >= {}",
                defaults::MIN_MESSAGE_CHARS
            )));
        }
        Ok(())
    }
}

/// Sitemap source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the sitemap or sitemap index
    #[serde(default)]
    pub sitemap_url: String,
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Page request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Longer timeout for sitemap requests
    #[serde(default = "defaults::sitemap_timeout")]
    pub sitemap_timeout_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent page requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum changed pages whose title is fetched per run
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            sitemap_timeout_secs: defaults::sitemap_timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Digest composition and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Maximum entries rendered in one digest
    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// Hours between scheduled runs
    #[serde(default = "defaults::interval_hours")]
    pub interval_hours: u64,

    /// Run once immediately when the scheduler starts
    #[serde(default = "defaults::run_on_start")]
    pub run_on_start: bool,

    /// Destination channel for scheduled digests
    #[serde(default)]
    pub channel: Option<String>,

    /// Identity allowed to change privileged settings
    #[serde(default)]
    pub admin_id: Option<String>,
}

impl DigestConfig {
    /// Whether `user` may run privileged commands.
    ///
    /// Everyone is allowed when no administrator is configured.
    pub fn is_admin(&self, user: &str) -> bool {
        match &self.admin_id {
            Some(admin) => admin == user,
            None => true,
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_items: defaults::max_items(),
            interval_hours: defaults::interval_hours(),
            run_on_start: defaults::run_on_start(),
            channel: None,
            admin_id: None,
        }
    }
}

/// Outbound transport limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum characters per outbound message
    #[serde(default = "defaults::max_message_chars")]
    pub max_message_chars: usize,

    /// Maximum digest entries per outbound message
    #[serde(default = "defaults::max_items_per_message")]
    pub max_items_per_message: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_message_chars: defaults::max_message_chars(),
            max_items_per_message: defaults::max_items_per_message(),
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the last seen fingerprints
    #[serde(default = "defaults::snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: defaults::snapshot_path(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub const MIN_MESSAGE_CHARS: usize = 64;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; SitemapDigest/1.0)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn sitemap_timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        0
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn max_pages() -> usize {
        100
    }

    // Digest defaults
    pub fn max_items() -> usize {
        50
    }
    pub fn interval_hours() -> u64 {
        1
    }
    pub fn run_on_start() -> bool {
        true
    }

    // Delivery defaults
    pub fn max_message_chars() -> usize {
        4096
    }
    pub fn max_items_per_message() -> usize {
        20
    }

    // Storage defaults
    pub fn snapshot_path() -> PathBuf {
        PathBuf::from("data/last_articles.json")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
