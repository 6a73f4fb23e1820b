use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per instance id.
///
/// Operations on the same instance queue behind each other; different
/// instances never share a mutex. The table itself is only locked for the
/// lookup, never across an await.
#[derive(Debug, Default)]
pub struct InstanceLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance_id`.
    pub async fn acquire(&self, instance_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock();
            // Entries only the table references are neither held nor awaited
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(instance_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of instances currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
