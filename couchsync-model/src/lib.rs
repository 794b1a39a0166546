//! Entity and document model for couchsync.
//!
//! Defines the two shapes the sync engine translates between:
//! - [`Entity`]: a typed record owned by the primary store, made of
//!   [`FieldValue`]s and described by an [`EntitySchema`]
//! - [`FlatDocument`]: the JSON-compatible key/value document written to
//!   the document store, with the reserved `created`/`changed` timestamps
//!
//! The flattening layer converts the first into the second; nothing in this
//! crate performs I/O.

mod document;
mod entity;
mod schema;
mod value;

pub use document::{FlatDocument, RESERVED_FIELDS};
pub use entity::Entity;
pub use schema::{EntitySchema, FieldDefinition, FieldType, SchemaCatalog};
pub use value::{EntityReference, FieldValue};
