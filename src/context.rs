//! Shared client-session state.
//!
//! Instead of ambient globals, the cache and the activity log live in an
//! explicit context handed to the sync client and the API client. The
//! context is created at session start and dropped at teardown; cloning it
//! is cheap and shares the same underlying state.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::activity::{ActivityLog, LogEntry};
use crate::cache::ResourceCache;

/// Dependency-injected state for one client session.
#[derive(Clone)]
pub struct SyncContext {
    pub cache: Arc<RwLock<ResourceCache>>,
    pub log: Arc<RwLock<ActivityLog>>,
}

impl SyncContext {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(ResourceCache::new())),
            log: Arc::new(RwLock::new(ActivityLog::new())),
        }
    }

    /// Append a log entry. Convenience for the write-lock dance.
    pub async fn append_log(&self, entry: LogEntry) {
        self.log.write().await.append(entry);
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new()
    }
}
