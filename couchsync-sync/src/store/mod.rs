//! Document store abstraction.
//!
//! Defines the operations the orchestrator needs from a revisioned
//! document store. Every write carries the revision the caller last saw;
//! a store with a newer revision refuses the write with
//! [`StoreError::RevisionConflict`]. Implementations never retry
//! internally.

mod couchdb;
mod memory;

pub use couchdb::{CouchDbConfig, CouchDbStore};
pub use memory::MemoryStore;

use async_trait::async_trait;
use couchsync_model::FlatDocument;
use couchsync_types::{DocumentRef, Revision};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with this ID.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The store holds a different revision than the one supplied, or the
    /// document already exists on create.
    #[error("revision conflict on {0}")]
    RevisionConflict(String),

    /// Timeout, dropped connection or server-side failure. Safe to retry.
    #[error("transient store error: {0}")]
    Transient(String),

    /// The store refused the request outright (bad request, auth, ...).
    #[error("store rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client could not be set up.
    #[error("store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the write lost a revision race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::RevisionConflict(_))
    }
}

/// A fetched document and the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document body without store metadata.
    pub document: FlatDocument,
    /// Revision the body was read at.
    pub revision: Revision,
}

/// Revisioned document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the name of the store backend.
    fn backend_name(&self) -> &'static str;

    /// Creates the target database if it does not exist.
    async fn ensure_database(&self) -> StoreResult<()>;

    /// Fetches the current document and its revision.
    async fn get(&self, doc_ref: &DocumentRef) -> StoreResult<StoredDocument>;

    /// Creates a new document. Fails with a conflict if it already exists.
    async fn create(&self, doc_ref: &DocumentRef, document: &FlatDocument) -> StoreResult<Revision>;

    /// Replaces the document, provided `expected` is still its revision.
    async fn update(
        &self,
        doc_ref: &DocumentRef,
        document: &FlatDocument,
        expected: &Revision,
    ) -> StoreResult<Revision>;

    /// Deletes the document, provided `expected` is still its revision.
    async fn delete(&self, doc_ref: &DocumentRef, expected: &Revision) -> StoreResult<()>;
}
