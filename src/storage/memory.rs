//! In-memory snapshot storage.
//!
//! Used for dry runs and tests; state lives only as long as the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::Snapshot;
use crate::storage::SnapshotStore;

/// Process-local snapshot backend.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    state: RwLock<Option<(Snapshot, DateTime<Utc>)>>,
    read_only: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(Some((snapshot, Utc::now()))),
            read_only: false,
        }
    }

    /// Accept saves without recording them.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Snapshot {
        self.state
            .read()
            .await
            .as_ref()
            .map(|(snapshot, _)| snapshot.clone())
            .unwrap_or_default()
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.read_only {
            log::info!("Dry run: snapshot with {} pages not saved", snapshot.len());
            return Ok(());
        }
        *self.state.write().await = Some((snapshot.clone(), Utc::now()));
        Ok(())
    }

    async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.as_ref().map(|(_, at)| *at)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
