//! Per-label mutual exclusion.
//!
//! Allocations for the same label are serialized; different labels never
//! contend. A label's entry lives only while someone holds or waits on it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Async locks keyed by user label.
#[derive(Debug, Default, Clone)]
pub struct LabelLocks {
    inner: Arc<LockMap>,
}

impl LabelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `label`.
    pub async fn acquire(&self, label: &str) -> LabelGuard {
        // Clone out of the map before awaiting; a shard lock must not be
        // held across the wait.
        let mutex = self.inner.entry(label.to_string()).or_default().clone();
        // Built before the wait so that an abandoned wait still prunes the
        // entry: the pending lock future is dropped first, then this guard.
        let mut held = LabelGuard {
            label: label.to_string(),
            locks: self.inner.clone(),
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of labels currently locked or waited on.
    pub fn in_flight(&self) -> usize {
        self.inner.len()
    }
}

/// Exclusive access to one label. Released on drop.
///
/// `guard` is `None` only while `acquire` is still waiting.
#[derive(Debug)]
pub struct LabelGuard {
    label: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LabelGuard {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for LabelGuard {
    fn drop(&mut self) {
        // Release first so our Arc no longer counts, then drop the entry if
        // the map holds the only reference left.
        self.guard.take();
        self.locks
            .remove_if(&self.label, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
