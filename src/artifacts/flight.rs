//! Single-flight lock table
//!
//! One async mutex per cache key. The holder of a key's lock is the only
//! caller allowed to generate for that key; everyone else queues behind it
//! and re-checks the cache once the lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::types::ArtifactKind;

/// Key of an in-flight generation
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FlightKey {
    pub document_id: String,
    pub owner_id: String,
    pub kind: ArtifactKind,
    /// Requested question count (quizzes only)
    pub size: Option<u32>,
}

impl FlightKey {
    pub fn new(document_id: &str, owner_id: &str, kind: ArtifactKind, size: Option<u32>) -> Self {
        Self {
            document_id: document_id.to_string(),
            owner_id: owner_id.to_string(),
            kind,
            size,
        }
    }
}

/// Lock of one key and the number of guards holding or awaiting it
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

/// Table of per-key generation locks
#[derive(Default)]
pub struct FlightTable {
    slots: Mutex<HashMap<FlightKey, Slot>>,
}

impl FlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`
    ///
    /// The key is registered before waiting, so a caller cancelled while
    /// queued still releases its registration.
    pub async fn acquire(&self, key: FlightKey) -> FlightGuard<'_> {
        let lock = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        let mut flight = FlightGuard {
            table: self,
            key,
            guard: None,
        };
        flight.guard = Some(lock.lock_owned().await);
        flight
    }

    /// Number of keys currently held or awaited
    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, key: &FlightKey) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(key);
            }
        }
    }
}

/// Registration on a key; exclusive ownership once acquired, released on drop
pub struct FlightGuard<'a> {
    table: &'a FlightTable,
    key: FlightKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.key);
        self.guard.take();
    }
}
