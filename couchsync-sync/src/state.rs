//! Sync state tracking.
//!
//! Records, per document identity, what this orchestrator last did: the
//! revision it wrote and when. The store stays the source of truth for
//! create-vs-update; this state only decides whether an identity was
//! deleted and answers status queries.

use couchsync_types::{DocumentRef, Revision, UnixTimestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentState {
    /// Never synced by this orchestrator.
    #[default]
    Absent,
    /// Written at least once and not deleted since.
    Synced,
    /// Deleted. Updates are refused until an explicit create.
    Deleted,
}

/// Known sync status of one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySyncStatus {
    /// Where the identity is in its lifecycle.
    pub state: DocumentState,
    /// Revision returned by the last successful write.
    pub revision: Option<Revision>,
    /// When the last write or delete happened.
    pub last_synced: Option<UnixTimestamp>,
}

/// Tracks sync status for all identities seen.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    entries: HashMap<DocumentRef, EntitySyncStatus>,
}

impl SyncState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of `doc_ref`; `Absent` when never seen.
    pub fn status(&self, doc_ref: &DocumentRef) -> EntitySyncStatus {
        self.entries.get(doc_ref).cloned().unwrap_or_default()
    }

    /// Lifecycle state of `doc_ref`.
    pub fn state(&self, doc_ref: &DocumentRef) -> DocumentState {
        self.entries
            .get(doc_ref)
            .map_or(DocumentState::Absent, |s| s.state)
    }

    /// Records a successful create or update.
    pub fn record_synced(&mut self, doc_ref: &DocumentRef, revision: Revision, at: UnixTimestamp) {
        self.entries.insert(
            doc_ref.clone(),
            EntitySyncStatus {
                state: DocumentState::Synced,
                revision: Some(revision),
                last_synced: Some(at),
            },
        );
    }

    /// Records that the document is gone, whether deleted now or already absent.
    pub fn record_deleted(&mut self, doc_ref: &DocumentRef, at: UnixTimestamp) {
        self.entries.insert(
            doc_ref.clone(),
            EntitySyncStatus {
                state: DocumentState::Deleted,
                revision: None,
                last_synced: Some(at),
            },
        );
    }

    /// `doc_ref` carrying the last revision written for it, if any.
    pub fn known_ref(&self, doc_ref: &DocumentRef) -> DocumentRef {
        let mut known = doc_ref.clone();
        known.set_revision(self.entries.get(doc_ref).and_then(|s| s.revision.clone()));
        known
    }

    /// Drops everything known about `doc_ref`. Returns whether it was tracked.
    pub fn forget(&mut self, doc_ref: &DocumentRef) -> bool {
        self.entries.remove(doc_ref).is_some()
    }

    /// Drops `Synced` entries, keeping only deletion tombstones.
    ///
    /// The store remains authoritative for synced documents, so only the
    /// tombstones carry information the store cannot give back.
    pub fn evict_synced(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, s| s.state != DocumentState::Synced);
        before - self.entries.len()
    }

    /// Drops tombstones recorded before `cutoff`.
    pub fn evict_deleted_before(&mut self, cutoff: UnixTimestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, s| {
            s.state != DocumentState::Deleted || s.last_synced.is_some_and(|at| at >= cutoff)
        });
        before - self.entries.len()
    }

    /// Number of identities in `state`.
    pub fn count(&self, state: DocumentState) -> usize {
        self.entries.values().filter(|s| s.state == state).count()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identity is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
