//! Error types for the flattening layer.

use crate::hooks::HookError;
use thiserror::Error;

/// Result type for flattening operations.
pub type FlattenResult<T> = Result<T, FlattenError>;

/// Errors raised while registering flatteners or flattening an entity.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// A flattener with this name is already registered.
    #[error("flattener already registered: {0}")]
    DuplicateFlattener(String),

    /// Another flattener already claims the same target.
    #[error("flattener '{name}' targets {target}, already claimed by '{existing}'")]
    ConflictingFlattener {
        name: String,
        target: String,
        existing: String,
    },

    /// No flattener applies to this combination.
    #[error("no flattener registered for field type '{field_type}' on entity type '{entity_type}'")]
    FlattenerNotFound {
        entity_type: String,
        field_type: String,
    },

    /// The raw value is not primitive and no flattener could convert it.
    #[error("field '{field}' on {entity_type} holds a {kind} value that cannot be flattened")]
    UnflattenableField {
        entity_type: String,
        field: String,
        kind: &'static str,
    },

    /// A required field has no value on the entity.
    #[error("required field '{field}' missing on {entity_type} {entity_id}")]
    MissingRequiredField {
        entity_type: String,
        entity_id: String,
        field: String,
    },

    /// A resolved flattener rejected the value.
    #[error("flattener '{flattener}' failed on field '{field}': {message}")]
    FlattenerFailed {
        flattener: String,
        field: String,
        message: String,
    },

    /// A `flatten_entity_fields_alter` subscriber failed.
    #[error(transparent)]
    Hook(#[from] HookError),
}
