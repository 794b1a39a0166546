//! Error types for the sync layer.

use crate::store::StoreError;
use couchsync_flatten::{FlattenError, HookError};
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing one entity.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The entity could not be flattened.
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    /// A document hook refused the operation.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The store failed, after any transient retries.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A write kept hitting a newer revision after the one allowed retry.
    #[error("revision conflict persisted after retry on {doc_id}")]
    SyncConflict { doc_id: String },

    /// Updates are not applied to documents this orchestrator deleted.
    #[error("{doc_id} was deleted; create the entity again to resume syncing")]
    EntityDeleted { doc_id: String },
}

/// Coarse classification of a [`SyncError`], for reporting and re-queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    Flatten,
    Hook,
    /// Retries exhausted on a transient store error; worth re-triggering.
    Transient,
    /// The store refused or could not be reached in a non-retryable way.
    Store,
    /// Revision conflict that survived the single retry.
    Conflict,
    /// Update of an entity this orchestrator has deleted.
    Deleted,
}

impl SyncErrorKind {
    /// Stable lowercase name, for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flatten => "flatten",
            Self::Hook => "hook",
            Self::Transient => "transient",
            Self::Store => "store",
            Self::Conflict => "conflict",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncError {
    /// Classifies the error for retry decisions.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Flatten(FlattenError::Hook(_)) | Self::Hook(_) => SyncErrorKind::Hook,
            Self::Flatten(_) => SyncErrorKind::Flatten,
            Self::Store(e) if e.is_transient() => SyncErrorKind::Transient,
            Self::Store(StoreError::RevisionConflict(_)) | Self::SyncConflict { .. } => {
                SyncErrorKind::Conflict
            }
            Self::Store(_) => SyncErrorKind::Store,
            Self::EntityDeleted { .. } => SyncErrorKind::Deleted,
        }
    }
}

/// A sync that ended in failure, with enough identity to re-trigger it.
#[derive(Debug, Error)]
#[error("sync of {entity_type} {entity_id} failed: {error}")]
pub struct SyncFailure {
    /// Type of the entity that failed.
    pub entity_type: String,
    /// Id of the entity that failed.
    pub entity_id: String,
    #[source]
    pub error: SyncError,
}

impl SyncFailure {
    /// Kind of the underlying error.
    pub fn kind(&self) -> SyncErrorKind {
        self.error.kind()
    }
}
