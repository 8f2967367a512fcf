//! Per-reference serialization of read-modify-write sequences.

use aas_assetsync_core::Reference;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 256;

/// One async mutex per [`Reference`], created on demand.
///
/// Entries nobody holds or waits for are pruned once the table grows.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Reference, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `reference`.
    pub async fn lock(&self, reference: &Reference) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() >= PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(reference.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of tracked references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether no reference is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
