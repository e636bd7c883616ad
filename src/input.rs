//! Navigation event payloads
//!
//! Parses the JSON details the browser attaches to request-interception and
//! navigation events. Field names follow the browser's camelCase.

use serde::Deserialize;

/// Kind of resource a request loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Top-level document load
    #[default]
    MainFrame,

    /// Embedded frame document
    SubFrame,

    /// Any sub-resource (script, image, xhr, ...)
    #[serde(other)]
    Other,
}

fn no_tab() -> i64 {
    -1
}

/// Details of a request about to be made
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    /// Requested URL
    pub url: String,

    /// Owning tab, or -1 for requests not tied to a tab
    #[serde(default = "no_tab")]
    pub tab_id: i64,

    /// Frame issuing the request (0 = top-level)
    #[serde(default)]
    pub frame_id: i64,

    /// Resource type; only `main_frame` requests are considered
    #[serde(default, rename = "type")]
    pub resource_type: ResourceType,
}

impl RequestDetails {
    /// Top-level document request for a tab
    pub fn main_frame(url: impl Into<String>, tab_id: i64) -> Self {
        Self {
            url: url.into(),
            tab_id,
            frame_id: 0,
            resource_type: ResourceType::MainFrame,
        }
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether this request loads a top-level document
    pub fn is_main_frame(&self) -> bool {
        self.resource_type == ResourceType::MainFrame
    }
}

/// Details of a history-state update or committed navigation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDetails {
    pub tab_id: i64,
    pub url: String,
    pub frame_id: i64,
}

impl NavigationDetails {
    /// Create navigation details
    pub fn new(tab_id: i64, url: impl Into<String>, frame_id: i64) -> Self {
        Self {
            tab_id,
            url: url.into(),
            frame_id,
        }
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the navigation happened in the tab's top-level frame
    pub fn is_top_level(&self) -> bool {
        self.frame_id == 0
    }
}
