//! Sync orchestrator.
//!
//! Turns entity lifecycle events into document store writes:
//!
//! ```text
//! create/update:  flatten ──► get ──┬─ NotFound ──► pre_insert ──► create
//!                                   └─ found ─────► pre_update ──► update(rev)
//! delete:         get ──┬─ NotFound ──► done (idempotent)
//!                       └─ found ─────► pre_delete ──► delete(rev)
//! ```
//!
//! A revision conflict on a write re-fetches and retries exactly once.
//! Transient store errors are retried per [`RetryPolicy`](crate::RetryPolicy)
//! on every store call. Work on one identity is serialized; different
//! identities run in parallel.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncFailure, SyncResult};
use crate::locks::IdentityLocks;
use crate::retry::with_transient_retry;
use crate::state::{DocumentState, EntitySyncStatus, SyncState};
use crate::store::{DocumentStore, StoreError, StoreResult, StoredDocument};
use couchsync_flatten::{EntityFlattener, HookContext, HookDispatcher};
use couchsync_model::{Entity, FlatDocument};
use couchsync_types::{Clock, DocumentRef, Revision, SystemClock, UnixTimestamp};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A lifecycle notification from the primary store.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// The entity was inserted.
    Create(Entity),
    /// The entity was saved again.
    Update(Entity),
    /// The entity was removed; only its identity remains.
    Delete {
        entity_type: String,
        entity_id: String,
    },
}

impl LifecycleEvent {
    /// Entity type the event is about.
    pub fn entity_type(&self) -> &str {
        match self {
            Self::Create(e) | Self::Update(e) => &e.entity_type,
            Self::Delete { entity_type, .. } => entity_type,
        }
    }

    /// Entity id the event is about.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Create(e) | Self::Update(e) => &e.id,
            Self::Delete { entity_id, .. } => entity_id,
        }
    }

    /// Identity of the mirrored document.
    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef::new(self.entity_type(), self.entity_id())
    }
}

/// What a successful sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new document was written.
    Created(Revision),
    /// An existing document was replaced.
    Updated(Revision),
    /// The document was removed.
    Deleted,
    /// Delete requested for a document that was not there.
    AlreadyAbsent,
    /// The entity type is not configured for syncing.
    Skipped,
}

impl SyncOutcome {
    /// Revision written, for creates and updates.
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Self::Created(rev) | Self::Updated(rev) => Some(rev),
            _ => None,
        }
    }
}

/// Per-entity results of [`SyncOrchestrator::sync_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful syncs. Refs carry the revision written, if any.
    pub succeeded: Vec<(DocumentRef, SyncOutcome)>,
    /// Failed syncs, with enough identity to re-trigger them.
    pub failed: Vec<SyncFailure>,
}

impl BatchReport {
    /// True when no event failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of events reported.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outcome recorded for `doc_ref`, if it succeeded.
    pub fn outcome(&self, doc_ref: &DocumentRef) -> Option<&SyncOutcome> {
        self.succeeded
            .iter()
            .find(|(r, _)| r == doc_ref)
            .map(|(_, outcome)| outcome)
    }

    /// Number of successes matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.succeeded.iter().filter(|(_, o)| predicate(o)).count()
    }
}

/// One sync operation in flight: identity plus the time it started.
struct Operation<'a> {
    doc_ref: &'a DocumentRef,
    doc_id: String,
    now: UnixTimestamp,
}

impl Operation<'_> {
    fn context(&self) -> HookContext<'_> {
        HookContext {
            entity_type: self.doc_ref.entity_type(),
            entity_id: self.doc_ref.entity_id(),
            now: self.now,
        }
    }

    fn conflict(&self) -> SyncError {
        SyncError::SyncConflict {
            doc_id: self.doc_id.clone(),
        }
    }
}

/// Keeps a document store in step with entity lifecycle events.
pub struct SyncOrchestrator {
    flattener: EntityFlattener,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    locks: IdentityLocks,
    state: RwLock<SyncState>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator reading time from the system clock.
    pub fn new(flattener: EntityFlattener, store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        Self::with_clock(flattener, store, Arc::new(SystemClock), config)
    }

    /// Creates an orchestrator reading time from `clock`.
    pub fn with_clock(
        flattener: EntityFlattener,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            flattener,
            store,
            clock,
            config,
            locks: IdentityLocks::new(),
            state: RwLock::new(SyncState::new()),
        }
    }

    /// The flattener turning entities into documents.
    pub fn flattener(&self) -> &EntityFlattener {
        &self.flattener
    }

    /// The document store written to.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Sync settings in effect.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn hooks(&self) -> &HookDispatcher {
        self.flattener.hooks()
    }

    /// Known sync status of `doc_ref`.
    pub async fn status(&self, doc_ref: &DocumentRef) -> EntitySyncStatus {
        self.state.read().await.status(doc_ref)
    }

    /// Copy of the whole sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// `doc_ref` carrying the last revision this orchestrator wrote for it.
    pub async fn known_ref(&self, doc_ref: &DocumentRef) -> DocumentRef {
        self.state.read().await.known_ref(doc_ref)
    }

    /// Drops the tracked status of `doc_ref`, tombstone included.
    ///
    /// Waits for any sync of that identity in flight.
    pub async fn forget(&self, doc_ref: &DocumentRef) -> bool {
        let _guard = self.locks.acquire(&doc_ref.document_id()).await;
        let forgotten = self.state.write().await.forget(doc_ref);
        debug!(doc_id = %doc_ref, forgotten, "Forgot sync status");
        forgotten
    }

    /// Drops tracked status for synced documents, keeping tombstones.
    /// Returns how many entries were dropped.
    pub async fn evict_synced(&self) -> usize {
        let evicted = self.state.write().await.evict_synced();
        debug!(evicted, "Evicted synced entries");
        evicted
    }

    /// Drops tombstones older than `cutoff`. Updates of those identities
    /// are accepted again afterwards.
    pub async fn evict_deleted_before(&self, cutoff: UnixTimestamp) -> usize {
        let evicted = self.state.write().await.evict_deleted_before(cutoff);
        debug!(evicted, cutoff = %cutoff, "Evicted deletion tombstones");
        evicted
    }

    /// Makes sure the target database exists.
    pub async fn prepare(&self) -> SyncResult<()> {
        let store = &self.store;
        with_transient_retry(
            &self.config.retry,
            "ensure_database",
            store.backend_name(),
            move || store.ensure_database(),
        )
        .await?;
        info!(backend = store.backend_name(), "Document store ready");
        Ok(())
    }

    /// Syncs a newly created entity.
    pub async fn on_create(&self, entity: &Entity) -> SyncResult<SyncOutcome> {
        if !self.config.syncs_type(&entity.entity_type) {
            return Ok(self.skipped(&entity.entity_type, &entity.id));
        }
        let doc_ref = entity.document_ref();
        let doc_id = doc_ref.document_id();
        let _guard = self.locks.acquire(&doc_id).await;
        let op = self.operation(&doc_ref, doc_id);

        let document = self.flattener.flatten(entity)?;
        match self.fetch(&op).await {
            Ok(existing) => {
                info!(doc_id = %op.doc_id, "Document already exists, updating instead");
                self.update_existing(&op, document, existing).await
            }
            Err(StoreError::NotFound(_)) => self.insert(&op, document).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Syncs a changed entity. A missing document is created.
    pub async fn on_update(&self, entity: &Entity) -> SyncResult<SyncOutcome> {
        if !self.config.syncs_type(&entity.entity_type) {
            return Ok(self.skipped(&entity.entity_type, &entity.id));
        }
        let doc_ref = entity.document_ref();
        let doc_id = doc_ref.document_id();
        let _guard = self.locks.acquire(&doc_id).await;
        let op = self.operation(&doc_ref, doc_id);

        if self.state.read().await.state(&doc_ref) == DocumentState::Deleted {
            warn!(doc_id = %op.doc_id, "Refusing update of deleted entity");
            return Err(SyncError::EntityDeleted { doc_id: op.doc_id });
        }

        let document = self.flattener.flatten(entity)?;
        match self.fetch(&op).await {
            Ok(existing) => self.update_existing(&op, document, existing).await,
            Err(StoreError::NotFound(_)) => {
                info!(doc_id = %op.doc_id, "Document missing on update, creating");
                self.insert(&op, document).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the document mirroring an entity. Deleting a document that
    /// is not there succeeds.
    pub async fn on_delete(&self, entity_type: &str, entity_id: &str) -> SyncResult<SyncOutcome> {
        if !self.config.syncs_type(entity_type) {
            return Ok(self.skipped(entity_type, entity_id));
        }
        let doc_ref = DocumentRef::new(entity_type, entity_id);
        let doc_id = doc_ref.document_id();
        let _guard = self.locks.acquire(&doc_id).await;
        let op = self.operation(&doc_ref, doc_id);

        let existing = match self.fetch(&op).await {
            Ok(existing) => existing,
            Err(StoreError::NotFound(_)) => {
                debug!(doc_id = %op.doc_id, "Document already absent");
                self.state.write().await.record_deleted(&doc_ref, op.now);
                return Ok(SyncOutcome::AlreadyAbsent);
            }
            Err(e) => return Err(e.into()),
        };

        self.hooks().pre_delete(&op.context())?;

        match self.store_delete(&op, &existing.revision).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(StoreError::RevisionConflict(_)) => {
                warn!(doc_id = %op.doc_id, "Revision conflict on delete, retrying once");
                match self.fetch(&op).await {
                    Ok(current) => match self.store_delete(&op, &current.revision).await {
                        Ok(()) | Err(StoreError::NotFound(_)) => {}
                        Err(StoreError::RevisionConflict(_)) => return Err(op.conflict()),
                        Err(e) => return Err(e.into()),
                    },
                    Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }

        self.state.write().await.record_deleted(&doc_ref, op.now);
        info!(doc_id = %op.doc_id, "Deleted document");
        Ok(SyncOutcome::Deleted)
    }

    /// Dispatches one lifecycle event.
    pub async fn sync(&self, event: LifecycleEvent) -> Result<SyncOutcome, SyncFailure> {
        let result = match &event {
            LifecycleEvent::Create(entity) => self.on_create(entity).await,
            LifecycleEvent::Update(entity) => self.on_update(entity).await,
            LifecycleEvent::Delete {
                entity_type,
                entity_id,
            } => self.on_delete(entity_type, entity_id).await,
        };

        result.map_err(|error| {
            warn!(
                entity_type = event.entity_type(),
                entity_id = event.entity_id(),
                kind = %error.kind(),
                error = %error,
                "Sync failed"
            );
            SyncFailure {
                entity_type: event.entity_type().to_string(),
                entity_id: event.entity_id().to_string(),
                error,
            }
        })
    }

    /// Syncs a batch of events with bounded concurrency.
    ///
    /// Failures are collected per entity; one failing entity never stops
    /// the others. Events for the same identity apply in batch order.
    pub async fn sync_batch(&self, events: Vec<LifecycleEvent>) -> BatchReport {
        let total = events.len();
        let results: Vec<Result<(DocumentRef, SyncOutcome), SyncFailure>> = stream::iter(events)
            .map(|event| async move {
                let mut doc_ref = event.document_ref();
                self.sync(event).await.map(|outcome| {
                    doc_ref.set_revision(outcome.revision().cloned());
                    (doc_ref, outcome)
                })
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(success) => report.succeeded.push(success),
                Err(failure) => report.failed.push(failure),
            }
        }

        info!(
            total,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch sync complete"
        );
        report
    }

    fn operation<'a>(&self, doc_ref: &'a DocumentRef, doc_id: String) -> Operation<'a> {
        Operation {
            doc_ref,
            doc_id,
            now: self.clock.now(),
        }
    }

    fn skipped(&self, entity_type: &str, entity_id: &str) -> SyncOutcome {
        debug!(entity_type, entity_id, "Entity type not synced, skipping");
        SyncOutcome::Skipped
    }

    async fn record_synced(&self, op: &Operation<'_>, revision: &Revision) {
        self.state
            .write()
            .await
            .record_synced(op.doc_ref, revision.clone(), op.now);
    }

    /// First write of a document.
    async fn insert(&self, op: &Operation<'_>, mut document: FlatDocument) -> SyncResult<SyncOutcome> {
        self.hooks().pre_insert(&op.context(), &mut document)?;

        match self.store_create(op, &document).await {
            Ok(revision) => {
                self.record_synced(op, &revision).await;
                info!(doc_id = %op.doc_id, revision = %revision, "Created document");
                Ok(SyncOutcome::Created(revision))
            }
            Err(StoreError::RevisionConflict(_)) => {
                warn!(doc_id = %op.doc_id, "Document appeared concurrently, updating instead");
                match self.fetch(op).await {
                    Ok(existing) => self.update_existing(op, document, existing).await,
                    Err(StoreError::NotFound(_)) => Err(op.conflict()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces an existing document, keeping its original `created`.
    async fn update_existing(
        &self,
        op: &Operation<'_>,
        mut document: FlatDocument,
        existing: StoredDocument,
    ) -> SyncResult<SyncOutcome> {
        document.created = existing.document.created;
        self.hooks().pre_update(&op.context(), &mut document)?;

        let revision = match self.store_update(op, &document, &existing.revision).await {
            Ok(revision) => revision,
            Err(StoreError::RevisionConflict(_)) => {
                warn!(doc_id = %op.doc_id, stale = %existing.revision, "Revision conflict, retrying once");
                let current = match self.fetch(op).await {
                    Ok(current) => current,
                    Err(StoreError::NotFound(_)) => return self.recreate(op, document).await,
                    Err(e) => return Err(e.into()),
                };
                document.created = current.document.created;
                match self.store_update(op, &document, &current.revision).await {
                    Ok(revision) => revision,
                    Err(StoreError::RevisionConflict(_)) => return Err(op.conflict()),
                    Err(StoreError::NotFound(_)) => return self.recreate(op, document).await,
                    Err(e) => return Err(e.into()),
                }
            }
            Err(StoreError::NotFound(_)) => return self.recreate(op, document).await,
            Err(e) => return Err(e.into()),
        };

        self.record_synced(op, &revision).await;
        info!(doc_id = %op.doc_id, revision = %revision, "Updated document");
        Ok(SyncOutcome::Updated(revision))
    }

    /// The document vanished mid-update; write it fresh, once.
    async fn recreate(&self, op: &Operation<'_>, mut document: FlatDocument) -> SyncResult<SyncOutcome> {
        info!(doc_id = %op.doc_id, "Document removed during update, recreating");
        self.hooks().pre_insert(&op.context(), &mut document)?;

        match self.store_create(op, &document).await {
            Ok(revision) => {
                self.record_synced(op, &revision).await;
                Ok(SyncOutcome::Created(revision))
            }
            Err(StoreError::RevisionConflict(_)) => Err(op.conflict()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, op: &Operation<'_>) -> StoreResult<StoredDocument> {
        let (store, doc_ref) = (&self.store, op.doc_ref);
        with_transient_retry(&self.config.retry, "get", &op.doc_id, move || store.get(doc_ref)).await
    }

    async fn store_create(&self, op: &Operation<'_>, document: &FlatDocument) -> StoreResult<Revision> {
        let (store, doc_ref) = (&self.store, op.doc_ref);
        with_transient_retry(&self.config.retry, "create", &op.doc_id, move || {
            store.create(doc_ref, document)
        })
        .await
    }

    async fn store_update(
        &self,
        op: &Operation<'_>,
        document: &FlatDocument,
        expected: &Revision,
    ) -> StoreResult<Revision> {
        let (store, doc_ref) = (&self.store, op.doc_ref);
        with_transient_retry(&self.config.retry, "update", &op.doc_id, move || {
            store.update(doc_ref, document, expected)
        })
        .await
    }

    async fn store_delete(&self, op: &Operation<'_>, expected: &Revision) -> StoreResult<()> {
        let (store, doc_ref) = (&self.store, op.doc_ref);
        with_transient_retry(&self.config.retry, "delete", &op.doc_id, move || {
            store.delete(doc_ref, expected)
        })
        .await
    }
}
