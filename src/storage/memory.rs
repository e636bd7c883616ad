//! In-memory store

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::{Store, StorageChange, StorageKey, CHANGE_CHANNEL_CAPACITY};
use crate::error::Result;

/// Store backed by a process-local map
///
/// Used by tests and by the host when no storage path is configured.
#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<HashMap<StorageKey, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Create a store pre-populated with values, without notifications
    pub fn with_values(values: impl IntoIterator<Item = (StorageKey, Value)>) -> Self {
        let store = Self::new();
        store.values.lock().extend(values);
        store
    }

    /// Copy of the current contents (for assertions)
    pub fn snapshot(&self) -> HashMap<StorageKey, Value> {
        self.values.lock().clone()
    }

    fn notify(&self, key: StorageKey, new_value: Option<Value>) {
        // No subscribers is fine
        let _ = self.changes.send(StorageChange { key, new_value });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<Value>> {
        Ok(self.values.lock().get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: Value) -> Result<()> {
        // Notify under the lock so subscribers see changes in write order
        let mut values = self.values.lock();
        values.insert(key, value.clone());
        self.notify(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        let mut values = self.values.lock();
        if values.remove(&key).is_some() {
            self.notify(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
