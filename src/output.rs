//! Decisions and responses for the navigation event source
//!
//! A [`Decision`] is what the engine concluded; a [`BlockingResponse`] is the
//! JSON the request interceptor hands back to the browser (`{}` to allow,
//! `{"cancel":true}` to cancel).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path produced a redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchSource {
    /// Direct rule match on an intercepted request
    #[serde(rename = "webRequest")]
    WebRequest,

    /// Rule match on the destination unwrapped from a redirector link
    #[serde(rename = "Google-wrapped")]
    GoogleWrapped,

    /// In-page history-state update in a single-page app
    #[serde(rename = "SPA-historyState")]
    SpaHistoryState,

    /// Committed top-level navigation
    #[serde(rename = "SPA-committed")]
    SpaCommitted,
}

impl MatchSource {
    /// Tag as persisted in the audit log
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::WebRequest => "webRequest",
            MatchSource::GoogleWrapped => "Google-wrapped",
            MatchSource::SpaHistoryState => "SPA-historyState",
            MatchSource::SpaCommitted => "SPA-committed",
        }
    }

    /// Whether this source can cancel the navigation (vs. correct it afterwards)
    pub fn can_cancel(&self) -> bool {
        matches!(self, MatchSource::WebRequest | MatchSource::GoogleWrapped)
    }
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision result from the redirect engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Let the navigation proceed
    Allow { reason: String },

    /// Divert to the sentinel page
    Redirect {
        /// URL that matched (the unwrapped destination for redirector links)
        url: String,
        source: MatchSource,
        #[serde(rename = "matchedRule")]
        matched_rule: Option<String>,
    },
}

impl Decision {
    /// Create an allow decision
    pub fn allow(reason: impl Into<String>) -> Self {
        Decision::Allow {
            reason: reason.into(),
        }
    }

    /// Create a redirect decision
    pub fn redirect(url: impl Into<String>, source: MatchSource, matched_rule: Option<String>) -> Self {
        Decision::Redirect {
            url: url.into(),
            source,
            matched_rule,
        }
    }

    /// Check if this is an allow decision
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Check if this is a redirect decision
    pub fn is_redirect(&self) -> bool {
        matches!(self, Decision::Redirect { .. })
    }

    /// Get the source tag if this is a redirect
    pub fn source(&self) -> Option<MatchSource> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Redirect { source, .. } => Some(*source),
        }
    }

    /// Get the matched rule string if applicable
    pub fn matched_rule(&self) -> Option<&str> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Redirect { matched_rule, .. } => matched_rule.as_deref(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Response to a blocking request interception
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel: Option<bool>,
}

impl BlockingResponse {
    /// Empty response: the request proceeds
    pub fn allow() -> Self {
        Self { cancel: None }
    }

    /// Cancel the request
    pub fn cancel() -> Self {
        Self { cancel: Some(true) }
    }

    /// Whether the request is cancelled
    pub fn is_cancel(&self) -> bool {
        self.cancel == Some(true)
    }

    /// Create a response from a request-interception decision
    pub fn from_decision(decision: &Decision) -> Self {
        match decision {
            Decision::Redirect { source, .. } if source.can_cancel() => Self::cancel(),
            _ => Self::allow(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
