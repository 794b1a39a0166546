//! Entity flattening for couchsync.
//!
//! Converts typed [`Entity`](couchsync_model::Entity) records into
//! [`FlatDocument`](couchsync_model::FlatDocument)s ready for the document
//! store.
//!
//! ## Components
//!
//! - **Registry**: maps `(entity type, field type)` to a [`FieldFlattener`]
//! - **Builtins**: flatteners for the standard field types
//! - **Discovery**: validates plugin listings against a compile-time handler table
//! - **Hooks**: ordered callbacks at the four document extension points
//! - **Flattener**: the per-entity pipeline tying the above together
//!
//! The registry is filled once at startup and then shared read-only behind
//! an `Arc`; flattening itself is synchronous and free of I/O.

pub mod builtin;
pub mod discovery;
mod error;
mod fields;
mod flattener;
pub mod hooks;
mod registry;

pub use discovery::{DiscoveryReport, FlattenerListing, HandlerCatalog, ListingEntry, RejectedFlattener};
pub use error::{FlattenError, FlattenResult};
pub use fields::FieldList;
pub use flattener::EntityFlattener;
pub use hooks::{ExtensionPoint, HookContext, HookDispatcher, HookError, SyncHook, TimestampHook};
pub use registry::{FieldFlattener, FlattenerDescriptor, FlattenerRegistry, FlattenerTarget};
