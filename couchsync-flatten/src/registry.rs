//! Flattener registry.
//!
//! Holds every registered [`FlattenerDescriptor`] and resolves the one that
//! applies to a field. A descriptor bound to a specific entity type wins
//! over a wildcard descriptor for the same field type.
//!
//! The registry is filled at startup and then shared behind an `Arc`; it
//! has no interior mutability, so lookups take no locks.

use crate::error::{FlattenError, FlattenResult};
use couchsync_model::{FieldType, FieldValue};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Converts one field value into its document representation.
pub trait FieldFlattener: Send + Sync {
    /// Whether this flattener can handle fields of `field_type`.
    fn accepts(&self, field_type: &FieldType) -> bool;

    /// Produces the JSON value stored in the document.
    /// Return `Err(message)` to reject the value.
    fn flatten(&self, value: &FieldValue) -> Result<Value, String>;
}

/// What a flattener is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlattenerTarget {
    /// `None` applies to every entity type.
    pub entity_type: Option<String>,
    pub field_type: FieldType,
}

impl fmt::Display for FlattenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_type {
            Some(t) => write!(f, "{}/{}", t, self.field_type),
            None => write!(f, "*/{}", self.field_type),
        }
    }
}

/// Registered flattener metadata plus its handler.
#[derive(Clone)]
pub struct FlattenerDescriptor {
    pub name: String,
    pub description: String,
    pub target: FlattenerTarget,
    /// Lookup path the handler was resolved from, when discovered.
    pub handler_path: Option<String>,
    pub handler: Arc<dyn FieldFlattener>,
}

impl FlattenerDescriptor {
    /// A wildcard descriptor for `field_type`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        field_type: FieldType,
        handler: Arc<dyn FieldFlattener>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target: FlattenerTarget {
                entity_type: None,
                field_type,
            },
            handler_path: None,
            handler,
        }
    }

    /// Restricts the descriptor to one entity type.
    pub fn for_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.target.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_handler_path(mut self, path: impl Into<String>) -> Self {
        self.handler_path = Some(path.into());
        self
    }
}

impl fmt::Debug for FlattenerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenerDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("target", &self.target)
            .field("handler_path", &self.handler_path)
            .finish_non_exhaustive()
    }
}

/// Name- and target-indexed set of flatteners.
#[derive(Debug, Default)]
pub struct FlattenerRegistry {
    descriptors: HashMap<String, FlattenerDescriptor>,
    targets: HashMap<FlattenerTarget, String>,
}

impl FlattenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-filled with the built-in flatteners.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in crate::builtin::descriptors() {
            let name = descriptor.name.clone();
            if let Err(e) = registry.register(descriptor) {
                warn!(flattener = %name, error = %e, "Built-in flattener clashes, skipping");
                debug_assert!(false, "built-in flattener {name} clashes: {e}");
            }
        }
        registry
    }

    /// Adds a descriptor.
    ///
    /// Fails if the name is taken, or if another descriptor already claims
    /// the exact same target.
    pub fn register(&mut self, descriptor: FlattenerDescriptor) -> FlattenResult<()> {
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(FlattenError::DuplicateFlattener(descriptor.name));
        }
        if let Some(existing) = self.targets.get(&descriptor.target) {
            return Err(FlattenError::ConflictingFlattener {
                name: descriptor.name,
                target: descriptor.target.to_string(),
                existing: existing.clone(),
            });
        }

        info!(
            flattener = %descriptor.name,
            target = %descriptor.target,
            "Registered flattener"
        );
        self.targets
            .insert(descriptor.target.clone(), descriptor.name.clone());
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Finds the flattener for a field of `field_type` on `entity_type`.
    pub fn resolve(&self, entity_type: &str, field_type: &FieldType) -> FlattenResult<&FlattenerDescriptor> {
        let specific = FlattenerTarget {
            entity_type: Some(entity_type.to_string()),
            field_type: field_type.clone(),
        };
        let wildcard = FlattenerTarget {
            entity_type: None,
            field_type: field_type.clone(),
        };

        self.targets
            .get(&specific)
            .or_else(|| self.targets.get(&wildcard))
            .and_then(|name| self.descriptors.get(name))
            .ok_or_else(|| FlattenError::FlattenerNotFound {
                entity_type: entity_type.to_string(),
                field_type: field_type.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&FlattenerDescriptor> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
