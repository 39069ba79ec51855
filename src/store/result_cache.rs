use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::JobRecord;

/// Single-slot holder for the last recommendation list fetched in a session
///
/// Clones share the slot. There is no expiry and nothing is written to disk;
/// the value lives as long as the owning session.
#[derive(Clone, Default)]
pub struct ResultCache {
    slot: Arc<RwLock<Option<Vec<JobRecord>>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list, if any
    pub async fn get(&self) -> Option<Vec<JobRecord>> {
        self.slot.read().await.clone()
    }

    /// Replaces whatever was cached
    pub async fn set(&self, jobs: Vec<JobRecord>) {
        let count = jobs.len();
        *self.slot.write().await = Some(jobs);
        tracing::debug!(jobs = count, "Result cache populated");
    }

    pub async fn is_populated(&self) -> bool {
        self.slot.read().await.is_some()
    }
}
