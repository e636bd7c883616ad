//! Persistent key-value store
//!
//! The store is an external collaborator: an asynchronous map from a fixed
//! set of keys to JSON values, with change notifications. Every call is a
//! suspension point, so concurrent read-modify-write sequences built on top
//! of it are not atomic unless the caller serializes them.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

use crate::error::Result;

/// Capacity of the change-notification channel
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Keys of persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    /// Ordered rule strings
    #[serde(rename = "destinationRules")]
    DestinationRules,

    /// Whether seen entries are recorded
    #[serde(rename = "loggingEnabled")]
    LoggingEnabled,

    /// Audit log, most-recent-first
    #[serde(rename = "seenUrls")]
    SeenUrls,
}

impl StorageKey {
    /// All known keys
    pub const ALL: [StorageKey; 3] = [
        StorageKey::DestinationRules,
        StorageKey::LoggingEnabled,
        StorageKey::SeenUrls,
    ];

    /// Name as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::DestinationRules => "destinationRules",
            StorageKey::LoggingEnabled => "loggingEnabled",
            StorageKey::SeenUrls => "seenUrls",
        }
    }

    /// Parse a persisted key name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to one key; `new_value` is `None` when the key was removed
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: StorageKey,
    pub new_value: Option<Value>,
}

/// Asynchronous key-value store with change notifications
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a key
    async fn get(&self, key: StorageKey) -> Result<Option<Value>>;

    /// Write a key and notify subscribers
    async fn set(&self, key: StorageKey, value: Value) -> Result<()>;

    /// Remove a key and notify subscribers
    async fn remove(&self, key: StorageKey) -> Result<()>;

    /// Subscribe to changes made after this call
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Read the persisted rule list
///
/// `None` when the key is missing or not an array. Non-string elements are
/// dropped.
pub async fn load_rules(store: &dyn Store) -> Result<Option<Vec<String>>> {
    Ok(store
        .get(StorageKey::DestinationRules)
        .await?
        .as_ref()
        .and_then(rules_from_value))
}

/// Decode a rule list value (see [`load_rules`])
pub fn rules_from_value(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let rules: Vec<String> = items
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();

    if rules.len() != items.len() {
        tracing::warn!(
            dropped = items.len() - rules.len(),
            "Ignoring non-string entries in {}",
            StorageKey::DestinationRules
        );
    }

    Some(rules)
}

/// Persist the rule list
pub async fn save_rules(store: &dyn Store, rules: &[String]) -> Result<()> {
    store
        .set(StorageKey::DestinationRules, serde_json::to_value(rules)?)
        .await
}

/// Read the logging flag; `None` when missing or not a boolean
pub async fn load_logging_enabled(store: &dyn Store) -> Result<Option<bool>> {
    Ok(store
        .get(StorageKey::LoggingEnabled)
        .await?
        .and_then(|v| v.as_bool()))
}

/// Persist the logging flag
pub async fn save_logging_enabled(store: &dyn Store, enabled: bool) -> Result<()> {
    store
        .set(StorageKey::LoggingEnabled, Value::Bool(enabled))
        .await
}
