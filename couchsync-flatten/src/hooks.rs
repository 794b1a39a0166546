//! Document hooks.
//!
//! External subscribers observe or adjust in-flight data at four extension
//! points. Subscribers implement [`SyncHook`], overriding only the methods
//! for the points they care about, and are registered on a
//! [`HookDispatcher`] per point. Invocation runs subscribers in
//! registration order and stops at the first failure.
//!
//! Field-list alteration is threaded functionally: each subscriber receives
//! the current list by value and returns the list the next one sees.

use crate::fields::FieldList;
use couchsync_model::{Entity, FlatDocument};
use couchsync_types::UnixTimestamp;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The named places in the pipeline where subscribers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionPoint {
    /// Adjust the list of fields flattened for an entity.
    FlattenEntityFieldsAlter,
    /// First sync of an entity, before the document is created.
    PreInsertDocument,
    /// Sync of an entity whose document already exists, before the update.
    PreUpdateDocument,
    /// Before a document is deleted. Notification only.
    PreDeletedDocument,
}

impl ExtensionPoint {
    pub const ALL: [ExtensionPoint; 4] = [
        Self::FlattenEntityFieldsAlter,
        Self::PreInsertDocument,
        Self::PreUpdateDocument,
        Self::PreDeletedDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlattenEntityFieldsAlter => "flatten_entity_fields_alter",
            Self::PreInsertDocument => "pre_insert_document",
            Self::PreUpdateDocument => "pre_update_document",
            Self::PreDeletedDocument => "pre_deleted_document",
        }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber failed; invocation stopped there.
#[derive(Debug, Clone, Error)]
#[error("hook '{hook}' failed at {point}: {message}")]
pub struct HookError {
    pub point: ExtensionPoint,
    pub hook: String,
    pub message: String,
}

/// What document hooks are told about the operation in flight.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    /// Time of the sync operation, read once from the orchestrator's clock.
    pub now: UnixTimestamp,
}

/// A hook subscriber.
///
/// Every method defaults to a no-op, so subscribers implement only the
/// extension points they need. Subscribers are called for every entity
/// type and filter on `entity_type` themselves.
pub trait SyncHook: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// `flatten_entity_fields_alter`: returns the field list to flatten.
    fn alter_fields(
        &self,
        fields: FieldList,
        entity_type: &str,
        entity: &Entity,
    ) -> Result<FieldList, String> {
        let _ = (entity_type, entity);
        Ok(fields)
    }

    /// `pre_insert_document`: runs only the first time an entity is synced.
    fn pre_insert(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), String> {
        let _ = (ctx, document);
        Ok(())
    }

    /// `pre_update_document`: runs when the document already exists.
    fn pre_update(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), String> {
        let _ = (ctx, document);
        Ok(())
    }

    /// `pre_deleted_document`: the document is about to be deleted.
    fn pre_delete(&self, ctx: &HookContext<'_>) -> Result<(), String> {
        let _ = ctx;
        Ok(())
    }
}

/// Stamps `created`/`changed` from the operation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampHook;

impl SyncHook for TimestampHook {
    fn name(&self) -> &str {
        "timestamps"
    }

    fn pre_insert(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), String> {
        document.created = Some(ctx.now);
        document.changed = Some(ctx.now);
        Ok(())
    }

    fn pre_update(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), String> {
        document.changed = Some(ctx.now);
        Ok(())
    }
}

/// Ordered subscriber lists, one per extension point.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    hooks: HashMap<ExtensionPoint, Vec<Arc<dyn SyncHook>>>,
}

impl HookDispatcher {
    /// A dispatcher with no subscribers. Documents will carry no
    /// timestamps unless a subscriber sets them.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with [`TimestampHook`] registered first.
    pub fn with_timestamps() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_all(Arc::new(TimestampHook));
        dispatcher
    }

    /// Appends `hook` to the subscribers of `point`.
    pub fn register(&mut self, point: ExtensionPoint, hook: Arc<dyn SyncHook>) {
        debug!(point = %point, hook = hook.name(), "Registered hook");
        self.hooks.entry(point).or_default().push(hook);
    }

    /// Appends `hook` at every extension point.
    pub fn register_all(&mut self, hook: Arc<dyn SyncHook>) {
        for point in ExtensionPoint::ALL {
            self.register(point, Arc::clone(&hook));
        }
    }

    /// Number of subscribers at `point`.
    pub fn count(&self, point: ExtensionPoint) -> usize {
        self.hooks.get(&point).map_or(0, Vec::len)
    }

    /// Subscriber names at `point`, in invocation order.
    pub fn names(&self, point: ExtensionPoint) -> Vec<String> {
        self.subscribers(point)
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    fn subscribers(&self, point: ExtensionPoint) -> &[Arc<dyn SyncHook>] {
        self.hooks.get(&point).map(Vec::as_slice).unwrap_or_default()
    }

    fn fail(point: ExtensionPoint, hook: &dyn SyncHook, message: String) -> HookError {
        HookError {
            point,
            hook: hook.name().to_string(),
            message,
        }
    }

    /// Threads `fields` through every `flatten_entity_fields_alter` subscriber.
    pub fn alter_fields(
        &self,
        mut fields: FieldList,
        entity_type: &str,
        entity: &Entity,
    ) -> Result<FieldList, HookError> {
        let point = ExtensionPoint::FlattenEntityFieldsAlter;
        for hook in self.subscribers(point) {
            fields = hook
                .alter_fields(fields, entity_type, entity)
                .map_err(|m| Self::fail(point, hook.as_ref(), m))?;
        }
        Ok(fields)
    }

    pub fn pre_insert(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), HookError> {
        let point = ExtensionPoint::PreInsertDocument;
        for hook in self.subscribers(point) {
            hook.pre_insert(ctx, document)
                .map_err(|m| Self::fail(point, hook.as_ref(), m))?;
        }
        Ok(())
    }

    pub fn pre_update(&self, ctx: &HookContext<'_>, document: &mut FlatDocument) -> Result<(), HookError> {
        let point = ExtensionPoint::PreUpdateDocument;
        for hook in self.subscribers(point) {
            hook.pre_update(ctx, document)
                .map_err(|m| Self::fail(point, hook.as_ref(), m))?;
        }
        Ok(())
    }

    pub fn pre_delete(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        let point = ExtensionPoint::PreDeletedDocument;
        for hook in self.subscribers(point) {
            hook.pre_delete(ctx)
                .map_err(|m| Self::fail(point, hook.as_ref(), m))?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for point in ExtensionPoint::ALL {
            map.entry(&point.as_str(), &self.names(point));
        }
        map.finish()
    }
}
