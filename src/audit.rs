//! Bounded audit log of redirect decisions
//!
//! Entries are kept in the store under `seenUrls`, most-recent-first, and
//! truncated from the tail once the log exceeds its capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::Result;
use crate::output::{Decision, MatchSource};
use crate::storage::{self, StorageKey, Store};

/// Maximum number of entries kept in the log
pub const MAX_SEEN: usize = 300;

/// What the engine asks to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub url: String,
    pub source: MatchSource,
    pub matched_rule: Option<String>,
}

impl MatchRecord {
    /// Create a match record
    pub fn new(url: impl Into<String>, source: MatchSource, matched_rule: Option<String>) -> Self {
        Self {
            url: url.into(),
            source,
            matched_rule,
        }
    }

    /// Record for a redirect decision; `None` for allow decisions
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        match decision {
            Decision::Allow { .. } => None,
            Decision::Redirect {
                url,
                source,
                matched_rule,
            } => Some(Self::new(url.clone(), *source, matched_rule.clone())),
        }
    }
}

/// One persisted audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenEntry {
    /// URL that matched
    pub url: String,

    /// Rule string responsible, if any
    pub matched_rule: Option<String>,

    /// Path that produced the redirect
    pub source: MatchSource,

    /// Creation time, persisted as Unix milliseconds
    #[serde(rename = "ts", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl SeenEntry {
    /// Stamp a match record with the current time
    pub fn new(record: MatchRecord) -> Self {
        Self::at(record, Utc::now())
    }

    /// Stamp a match record with a given time
    pub fn at(record: MatchRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            url: record.url,
            matched_rule: record.matched_rule,
            source: record.source,
            timestamp,
        }
    }
}

/// Decode a persisted log, skipping entries that do not parse
pub fn entries_from_value(value: Value) -> Vec<SeenEntry> {
    let Value::Array(items) = value else {
        tracing::warn!("Ignoring {}: not an array", StorageKey::SeenUrls);
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<SeenEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable audit entry");
                None
            }
        })
        .collect()
}

/// Audit log over the persistent store
pub struct AuditLog {
    store: Arc<dyn Store>,
    capacity: usize,
    default_enabled: bool,

    /// Serializes read-modify-write of the log within this process
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Create an audit log with the default capacity
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_capacity(store, MAX_SEEN)
    }

    /// Create an audit log with a custom capacity
    pub fn with_capacity(store: Arc<dyn Store>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            default_enabled: true,
            write_lock: Mutex::new(()),
        }
    }

    /// Value of the logging flag when none is persisted
    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Maximum number of entries kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if recording is enabled
    pub async fn is_enabled(&self) -> Result<bool> {
        Ok(storage::load_logging_enabled(self.store.as_ref())
            .await?
            .unwrap_or(self.default_enabled))
    }

    /// Turn recording on or off; does not touch existing entries
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        storage::save_logging_enabled(self.store.as_ref(), enabled).await
    }

    /// Record a match
    ///
    /// Returns `false` without touching the log when logging is disabled.
    pub async fn record(&self, record: MatchRecord) -> Result<bool> {
        self.append(SeenEntry::new(record)).await
    }

    /// Prepend an already stamped entry, subject to the logging flag
    pub async fn append(&self, entry: SeenEntry) -> Result<bool> {
        if !self.is_enabled().await? {
            tracing::trace!(url = %entry.url, "Logging disabled, not recording");
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;

        let mut entries = self.entries().await?;
        entries.insert(0, entry);
        entries.truncate(self.capacity);

        self.store
            .set(StorageKey::SeenUrls, serde_json::to_value(&entries)?)
            .await?;
        Ok(true)
    }

    /// Current entries, most-recent-first
    pub async fn entries(&self) -> Result<Vec<SeenEntry>> {
        Ok(self
            .store
            .get(StorageKey::SeenUrls)
            .await?
            .map(entries_from_value)
            .unwrap_or_default())
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store
            .set(StorageKey::SeenUrls, Value::Array(Vec::new()))
            .await
    }
}

enum Job {
    Append(SeenEntry),
    Flush(oneshot::Sender<()>),
}

/// Background writer that applies audit entries in submission order
///
/// Lets event handlers return without waiting on the store.
#[derive(Debug, Clone)]
pub struct AuditQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl AuditQueue {
    /// Start the writer task for `log`; must run inside a tokio runtime
    ///
    /// The task ends once every clone of the queue is dropped.
    pub fn spawn(log: Arc<AuditLog>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Append(entry) => {
                        if let Err(e) = log.append(entry).await {
                            tracing::warn!(error = %e, "Failed to record match");
                        }
                    }
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    /// Stamp a record now and queue it for writing
    pub fn submit(&self, record: MatchRecord) {
        if self.tx.send(Job::Append(SeenEntry::new(record))).is_err() {
            tracing::warn!("Audit writer stopped, match not recorded");
        }
    }

    /// Wait until everything submitted so far has been written
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}
