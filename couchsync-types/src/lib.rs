//! Core type definitions for couchsync.
//!
//! This crate defines the small, storage-agnostic types shared by the
//! flattening and sync layers:
//! - Document identity ([`DocumentRef`]) and opaque revision tokens ([`Revision`])
//! - Unix timestamps and the injectable [`Clock`] used by document hooks
//!
//! Entity and document shapes live in `couchsync-model`.

mod ids;
mod timestamp;

pub use ids::{DocumentRef, Revision, DOCUMENT_ID_SEPARATOR};
pub use timestamp::{Clock, ManualClock, SystemClock, UnixTimestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
}
