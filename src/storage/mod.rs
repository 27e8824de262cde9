//! Storage abstractions for the fingerprint snapshot.
//!
//! The snapshot is the pipeline's only durable state. It is read once at
//! the start of a run and replaced as a whole at the end.
//!
//! ## File Layout
//!
//! ```text
//! {
//!   "updated_at": "2026-03-14T09:00:00Z",
//!   "count": 2,
//!   "pages": {
//!     "https://example.com/a": "2026-03-01",
//!     "https://example.com/b": "weekly_0.8_2026-03-14"
//!   }
//! }
//! ```
//!
//! A bare `{url: fingerprint}` object is accepted on load as well.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalSnapshotStore;
pub use memory::MemorySnapshotStore;

/// Persisted snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Time of the write
    pub updated_at: DateTime<Utc>,
    /// Number of pages
    pub count: usize,
    /// URL to fingerprint
    pub pages: Snapshot,
}

impl SnapshotFile {
    pub fn new(pages: Snapshot) -> Self {
        Self {
            updated_at: Utc::now(),
            count: pages.len(),
            pages,
        }
    }
}

/// Accepted on-disk shapes.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredSnapshot {
    File(SnapshotFile),
    Bare(Snapshot),
}

impl StoredSnapshot {
    pub(crate) fn into_parts(self) -> (Snapshot, Option<DateTime<Utc>>) {
        match self {
            Self::File(file) => (file.pages, Some(file.updated_at)),
            Self::Bare(pages) => (pages, None),
        }
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last snapshot.
    ///
    /// Absent or unreadable data yields an empty snapshot, never an error.
    async fn load(&self) -> Snapshot;

    /// Replace the stored snapshot.
    ///
    /// On failure the previously stored snapshot must remain readable.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Time of the last successful save, if known.
    async fn last_updated(&self) -> Option<DateTime<Utc>>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
