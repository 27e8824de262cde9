// src/config.rs

//! Configuration loading utilities.
//!
//! Combines the TOML file and environment overrides into the single entry
//! point used at startup.

use std::path::Path;

use crate::models::Config;

/// Load configuration from a TOML file and apply environment overrides.
///
/// A missing or unreadable file falls back to defaults, so a deployment can
/// be configured through the environment alone. Validation is left to the
/// caller, since inspection commands work with incomplete configuration.
pub fn load_config(path: &Path) -> Config {
    let mut config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::info!("No config file at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env();
    config
}
