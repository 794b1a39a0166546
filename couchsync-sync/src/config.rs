//! Orchestrator configuration.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backoff for transient store errors.
    pub retry: RetryPolicy,
    /// Upper bound on entities synced at once by `sync_batch`.
    pub max_concurrency: usize,
    /// When set, only these entity types are synced; events for other
    /// types are reported as skipped.
    pub entity_types: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrency: 8,
            entity_types: None,
        }
    }
}

impl SyncConfig {
    /// Whether events for `entity_type` are synced.
    pub fn syncs_type(&self, entity_type: &str) -> bool {
        self.entity_types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == entity_type))
    }
}
