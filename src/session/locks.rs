use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Per-session exclusive access.
///
/// Requests for one session run one at a time; different sessions never
/// contend. Entries nobody holds are pruned on the next acquire.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the session's lock. Held until the guard is dropped.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.retain(|id, lock| id == session_id || Arc::strong_count(lock) > 1);
            map.entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
impl SessionLocks {
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .map(|map| map.len())
            .unwrap_or_default()
    }
}
