//! JSON file store
//!
//! Keeps the whole map in memory and rewrites the file on every change.
//! Keys this crate does not know are preserved untouched.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};

use super::{Store, StorageChange, StorageKey, CHANGE_CHANNEL_CAPACITY};
use crate::error::{GuardError, Result};

/// Store persisted as a single JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    /// Open a store file, starting empty if it does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(GuardError::Storage(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened store");

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            values: Mutex::new(values),
            changes,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the map to a temp file and move it into place
    async fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn notify(&self, key: StorageKey, new_value: Option<Value>) {
        let _ = self.changes.send(StorageChange { key, new_value });
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, key: StorageKey) -> Result<Option<Value>> {
        Ok(self.values.lock().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: StorageKey, value: Value) -> Result<()> {
        let mut values = self.values.lock().await;

        // Commit to memory only once the file holds the new state
        let mut next = values.clone();
        next.insert(key.as_str().to_string(), value.clone());
        self.persist(&next).await?;
        *values = next;

        // Notify under the lock so subscribers see changes in write order
        self.notify(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        let mut values = self.values.lock().await;
        if !values.contains_key(key.as_str()) {
            return Ok(());
        }

        let mut next = values.clone();
        next.remove(key.as_str());
        self.persist(&next).await?;
        *values = next;

        self.notify(key, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
