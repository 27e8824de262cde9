// src/lib.rs

//! Sitemap Digest Library
//!
//! Watches a website sitemap, detects new and changed pages and compiles
//! them into digest messages, on a timer and on demand.

pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod utils;
