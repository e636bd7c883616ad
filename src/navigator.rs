//! Tab navigation
//!
//! The browser side effect of a redirect: point a tab at a new URL. It can
//! fail (the tab may already be closed); callers log and move on.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{GuardError, Result};

/// Something that can send a tab to a URL
#[async_trait]
pub trait TabNavigator: Send + Sync {
    /// Navigate `tab_id` to `url`
    async fn navigate(&self, tab_id: i64, url: &str) -> Result<()>;
}

/// A navigation request handed to the host's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateRequest {
    pub tab_id: i64,
    pub url: String,
}

/// Navigator that forwards requests over a channel
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<NavigateRequest>,
}

impl ChannelNavigator {
    /// Create a navigator and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NavigateRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn new(tx: mpsc::UnboundedSender<NavigateRequest>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TabNavigator for ChannelNavigator {
    async fn navigate(&self, tab_id: i64, url: &str) -> Result<()> {
        self.tx
            .send(NavigateRequest {
                tab_id,
                url: url.to_string(),
            })
            .map_err(|_| GuardError::Navigation {
                tab_id,
                reason: "navigation channel closed".to_string(),
            })
    }
}

/// Navigator that remembers requests, optionally failing for some tabs
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    requests: Mutex<Vec<NavigateRequest>>,
    closed_tabs: Mutex<Vec<i64>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make navigations to `tab_id` fail as if the tab were closed
    pub fn close_tab(&self, tab_id: i64) {
        self.closed_tabs.lock().push(tab_id);
    }

    /// Successful navigations so far
    pub fn requests(&self) -> Vec<NavigateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TabNavigator for RecordingNavigator {
    async fn navigate(&self, tab_id: i64, url: &str) -> Result<()> {
        if self.closed_tabs.lock().contains(&tab_id) {
            return Err(GuardError::Navigation {
                tab_id,
                reason: format!("No tab with id: {}", tab_id),
            });
        }
        self.requests.lock().push(NavigateRequest {
            tab_id,
            url: url.to_string(),
        });
        Ok(())
    }
}
