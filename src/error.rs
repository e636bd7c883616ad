//! Error types for redirect-guard

use thiserror::Error;

/// Errors surfaced by the store, config, and navigation layers
///
/// Event handlers never return these; they log and degrade to "no redirect".
#[derive(Debug, Error)]
pub enum GuardError {
    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse failure
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tab navigation failed (tab closed, host gone)
    #[error("Failed to navigate tab {tab_id}: {reason}")]
    Navigation { tab_id: i64, reason: String },

    /// A rule string that does not compile
    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Result type alias for redirect-guard operations
pub type Result<T> = std::result::Result<T, GuardError>;
