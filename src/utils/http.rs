// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Source of remote documents (sitemaps and pages).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` as text, failing after `timeout`.
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a fetcher with a client configured from `config`.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| AppError::fetch(url, e))?;

        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}
