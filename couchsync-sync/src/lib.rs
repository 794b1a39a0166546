//! Document store client and sync orchestration for couchsync.
//!
//! This crate keeps a remote CouchDB-compatible database in step with
//! entity lifecycle events:
//! - [`DocumentStore`]: the async store seam, with [`CouchDbStore`] over
//!   HTTP and [`MemoryStore`] in process
//! - [`SyncOrchestrator`]: flatten, then fetch to decide create vs update,
//!   then write with the fetched revision, retrying conflicts once
//! - [`RetryPolicy`]: exponential backoff for transient store errors
//! - [`IdentityLocks`]: serializes work on one document while different
//!   documents sync in parallel
//!
//! # Example
//!
//! ```
//! use couchsync_flatten::{EntityFlattener, FlattenerRegistry, HookDispatcher};
//! use couchsync_model::SchemaCatalog;
//! use couchsync_sync::{DocumentStore, MemoryStore, SyncConfig, SyncOrchestrator};
//! use std::sync::Arc;
//!
//! let flattener = EntityFlattener::new(
//!     Arc::new(FlattenerRegistry::with_builtins()),
//!     Arc::new(SchemaCatalog::new()),
//!     Arc::new(HookDispatcher::with_timestamps()),
//! );
//! let orchestrator = SyncOrchestrator::new(
//!     flattener,
//!     Arc::new(MemoryStore::new()),
//!     SyncConfig::default(),
//! );
//! assert_eq!(orchestrator.store().backend_name(), "memory");
//! ```

mod config;
mod error;
mod locks;
mod orchestrator;
mod retry;
mod state;
pub mod store;

pub use config::SyncConfig;
pub use error::{SyncError, SyncErrorKind, SyncFailure, SyncResult};
pub use locks::{IdentityGuard, IdentityLocks};
pub use orchestrator::{BatchReport, LifecycleEvent, SyncOrchestrator, SyncOutcome};
pub use retry::{with_transient_retry, RetryPolicy};
pub use state::{DocumentState, EntitySyncStatus, SyncState};
pub use store::{
    CouchDbConfig, CouchDbStore, DocumentStore, MemoryStore, StoreError, StoreResult,
    StoredDocument,
};
