//! Per-identity serialization.
//!
//! Each document ID gets its own async mutex, created on first use and
//! dropped from the map when the last holder or waiter lets go. Waiters
//! are served in FIFO order, so events for one identity apply in the order
//! their operations started.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Map of per-document-ID async mutexes.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl IdentityLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `doc_id`.
    pub async fn acquire(&self, doc_id: &str) -> IdentityGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(doc_id.to_string()).or_default())
        };
        let guard = slot.lock_owned().await;
        IdentityGuard {
            locks: self,
            doc_id: doc_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of identities currently held or waited on.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, doc_id: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own reference left: nobody holds or waits.
        if slots
            .get(doc_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(doc_id);
        }
    }
}

/// Exclusive access to one identity; released on drop.
#[derive(Debug)]
pub struct IdentityGuard<'a> {
    locks: &'a IdentityLocks,
    doc_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityGuard<'_> {
    /// Document ID this guard serializes.
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.doc_id);
    }
}
