//! In-process store with CouchDB-shaped revisions.
//!
//! Revisions are `{generation}-{hash}`: the generation counts writes to the
//! document ID (deletes included, so a recreated document never reuses an
//! old token) and the hash is a SHA-256 prefix over the written content.

use super::{DocumentStore, StoreError, StoreResult, StoredDocument};
use async_trait::async_trait;
use couchsync_model::FlatDocument;
use couchsync_types::{DocumentRef, Revision};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Slot {
    generation: u64,
    revision: Revision,
    /// `None` once deleted; the slot stays as a tombstone.
    document: Option<FlatDocument>,
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn revision_for(generation: u64, doc_id: &str, document: Option<&FlatDocument>) -> StoreResult<Revision> {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(generation.to_le_bytes());
        if let Some(document) = document {
            hasher.update(serde_json::to_vec(document)?);
        }
        let digest = hex::encode(hasher.finalize());
        Ok(Revision::new(format!("{generation}-{}", &digest[..32])))
    }

    fn write(slots: &mut HashMap<String, Slot>, doc_id: &str, document: Option<FlatDocument>) -> StoreResult<Revision> {
        let generation = slots.get(doc_id).map_or(0, |s| s.generation) + 1;
        let revision = Self::revision_for(generation, doc_id, document.as_ref())?;
        slots.insert(
            doc_id.to_string(),
            Slot {
                generation,
                revision: revision.clone(),
                document,
            },
        );
        Ok(revision)
    }

    /// Writes `document` regardless of the current revision, as another
    /// writer sharing the database would.
    pub async fn put_external(&self, doc_ref: &DocumentRef, document: FlatDocument) -> StoreResult<Revision> {
        let doc_id = doc_ref.document_id();
        let mut slots = self.slots.write().await;
        let revision = Self::write(&mut slots, &doc_id, Some(document))?;
        debug!(doc_id = %doc_id, revision = %revision, "External write");
        Ok(revision)
    }

    /// Removes the document regardless of its revision.
    pub async fn remove_external(&self, doc_ref: &DocumentRef) -> StoreResult<()> {
        let doc_id = doc_ref.document_id();
        let mut slots = self.slots.write().await;
        if slots.get(&doc_id).is_some_and(|s| s.document.is_some()) {
            Self::write(&mut slots, &doc_id, None)?;
        }
        Ok(())
    }

    /// Number of live (non-deleted) documents.
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|s| s.document.is_some())
            .count()
    }

    /// True when no live document is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a live document exists for `doc_ref`.
    pub async fn contains(&self, doc_ref: &DocumentRef) -> bool {
        self.slots
            .read()
            .await
            .get(&doc_ref.document_id())
            .is_some_and(|s| s.document.is_some())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_database(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, doc_ref: &DocumentRef) -> StoreResult<StoredDocument> {
        let doc_id = doc_ref.document_id();
        let slots = self.slots.read().await;
        match slots.get(&doc_id) {
            Some(Slot {
                revision,
                document: Some(document),
                ..
            }) => Ok(StoredDocument {
                document: document.clone(),
                revision: revision.clone(),
            }),
            _ => Err(StoreError::NotFound(doc_id)),
        }
    }

    async fn create(&self, doc_ref: &DocumentRef, document: &FlatDocument) -> StoreResult<Revision> {
        let doc_id = doc_ref.document_id();
        let mut slots = self.slots.write().await;
        if slots.get(&doc_id).is_some_and(|s| s.document.is_some()) {
            return Err(StoreError::RevisionConflict(doc_id));
        }
        let revision = Self::write(&mut slots, &doc_id, Some(document.clone()))?;
        debug!(doc_id = %doc_id, revision = %revision, "Created document");
        Ok(revision)
    }

    async fn update(
        &self,
        doc_ref: &DocumentRef,
        document: &FlatDocument,
        expected: &Revision,
    ) -> StoreResult<Revision> {
        let doc_id = doc_ref.document_id();
        let mut slots = self.slots.write().await;
        match slots.get(&doc_id) {
            Some(slot) if slot.document.is_some() && slot.revision == *expected => {}
            Some(slot) if slot.document.is_some() => {
                return Err(StoreError::RevisionConflict(doc_id));
            }
            _ => return Err(StoreError::NotFound(doc_id)),
        }
        let revision = Self::write(&mut slots, &doc_id, Some(document.clone()))?;
        debug!(doc_id = %doc_id, revision = %revision, "Updated document");
        Ok(revision)
    }

    async fn delete(&self, doc_ref: &DocumentRef, expected: &Revision) -> StoreResult<()> {
        let doc_id = doc_ref.document_id();
        let mut slots = self.slots.write().await;
        match slots.get(&doc_id) {
            Some(slot) if slot.document.is_some() && slot.revision == *expected => {}
            Some(slot) if slot.document.is_some() => {
                return Err(StoreError::RevisionConflict(doc_id));
            }
            _ => return Err(StoreError::NotFound(doc_id)),
        }
        Self::write(&mut slots, &doc_id, None)?;
        debug!(doc_id = %doc_id, "Deleted document");
        Ok(())
    }
}
