//! Flattener discovery.
//!
//! Plugin discovery supplies a listing of flatteners by name, each pointing
//! at a handler by lookup path. Handlers themselves are linked in at
//! compile time and collected in a [`HandlerCatalog`]; discovery resolves
//! each listed path against the catalog, checks the handler accepts the
//! declared field type, and registers what passes. Entries that fail are
//! logged and reported, never fatal.

use crate::builtin;
use crate::registry::{FieldFlattener, FlattenerDescriptor, FlattenerRegistry};
use couchsync_model::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// One discovered flattener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEntry {
    #[serde(default)]
    pub description: String,
    /// Lookup path into the [`HandlerCatalog`].
    pub handler: String,
    /// Restricts the flattener to one entity type; absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub field_type: FieldType,
}

/// Discovered flatteners by name, as supplied by plugin discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlattenerListing {
    entries: BTreeMap<String, ListingEntry>,
}

impl FlattenerListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ListingEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, entry: ListingEntry) -> Self {
        self.insert(name, entry);
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handler implementations available to discovery, by lookup path.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn FieldFlattener>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in handlers under their `couchsync::builtin::*` paths.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for (path, handler) in builtin::handlers() {
            catalog.insert(path, handler);
        }
        catalog
    }

    pub fn insert(&mut self, path: impl Into<String>, handler: Arc<dyn FieldFlattener>) {
        self.handlers.insert(path.into(), handler);
    }

    pub fn get(&self, path: &str) -> Option<&Arc<dyn FieldFlattener>> {
        self.handlers.get(path)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// A listing entry discovery refused to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFlattener {
    pub name: String,
    pub reason: String,
}

/// Outcome of registering a listing.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub rejected: Vec<RejectedFlattener>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    fn reject(&mut self, name: &str, reason: String) {
        warn!(flattener = %name, reason = %reason, "Rejected discovered flattener");
        self.rejected.push(RejectedFlattener {
            name: name.to_string(),
            reason,
        });
    }
}

impl FlattenerRegistry {
    /// Registers every valid entry of `listing`, resolving handlers from
    /// `catalog`. Invalid entries are skipped and reported.
    pub fn register_discovered(
        &mut self,
        listing: &FlattenerListing,
        catalog: &HandlerCatalog,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for (name, entry) in &listing.entries {
            let Some(handler) = catalog.get(&entry.handler) else {
                report.reject(name, format!("unknown handler '{}'", entry.handler));
                continue;
            };
            if !handler.accepts(&entry.field_type) {
                report.reject(
                    name,
                    format!(
                        "handler '{}' does not flatten field type '{}'",
                        entry.handler, entry.field_type
                    ),
                );
                continue;
            }

            let mut descriptor = FlattenerDescriptor::new(
                name.clone(),
                entry.description.clone(),
                entry.field_type.clone(),
                Arc::clone(handler),
            )
            .with_handler_path(entry.handler.clone());
            if let Some(entity_type) = &entry.entity_type {
                descriptor = descriptor.for_entity_type(entity_type.clone());
            }

            match self.register(descriptor) {
                Ok(()) => report.registered.push(name.clone()),
                Err(e) => report.reject(name, e.to_string()),
            }
        }

        info!(
            registered = report.registered.len(),
            rejected = report.rejected.len(),
            "Flattener discovery complete"
        );
        report
    }
}
