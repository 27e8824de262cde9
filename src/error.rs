// src/error.rs

//! Unified error handling for the digest pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network or HTTP failure while retrieving a sitemap or page
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Malformed XML or HTML
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Required configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot could not be read or written
    #[error("Persistence error at {path}: {message}")]
    Persistence { path: String, message: String },

    /// Scheduler worker is gone or dropped a request
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl AppError {
    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with context (usually the document URL).
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a persistence error for a storage location.
    pub fn persistence(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a scheduler error.
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::Scheduler(message.into())
    }

    /// Short description suitable for an end user.
    ///
    /// Never includes URLs or upstream error text; those go to the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Http(_) => "The sitemap could not be retrieved.",
            Self::Parse { .. } | Self::Url(_) => "The sitemap could not be read.",
            Self::Config(_) | Self::Toml(_) | Self::TomlSerialize(_) => {
                "The digest is not configured correctly."
            }
            Self::Persistence { .. } | Self::Io(_) | Self::Json(_) => {
                "The digest state could not be accessed."
            }
            Self::Scheduler(_) => "The digest service is not running.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_display() {
        let err = AppError::fetch("https://example.com/sitemap.xml", "timed out");
        assert_eq!(
            err.to_string(),
            "Fetch error for https://example.com/sitemap.xml: timed out"
        );
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = AppError::parse("https://example.com/secret.xml", "unexpected eof");
        let msg = err.user_message();
        assert!(!msg.contains("secret"));
        assert!(!msg.contains("eof"));
    }
}
