//! Single-slot pending-operation guard.
//!
//! At most one create/update may be in flight per contact identity. A caller
//! takes a [`PendingTicket`] before the directory call; the slot is released
//! when the ticket drops, on success, failure and unwind alike.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Tracks which contact identities have a mutation in flight.
#[derive(Debug, Clone, Default)]
pub struct PendingGuard {
    slots: Arc<Mutex<HashSet<String>>>,
}

impl PendingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `key`. Returns `None` if it is already taken.
    pub fn try_acquire(&self, key: &str) -> Option<PendingTicket> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if !slots.insert(key.to_string()) {
            debug!(contact = %key, "Pending operation already in flight");
            return None;
        }
        Some(PendingTicket {
            key: key.to_string(),
            slots: Arc::clone(&self.slots),
        })
    }

    /// Whether a mutation is in flight for `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// Number of identities with a mutation in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Proof of a claimed slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PendingTicket {
    key: String,
    slots: Arc<Mutex<HashSet<String>>>,
}

impl PendingTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
