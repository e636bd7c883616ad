//! Configuration loading for redirect-guard
//!
//! Supports TOML configuration with embedded defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audit::MAX_SEEN;
use crate::error::{GuardError, Result};
use crate::rules::{default_rules, validate_rule};

/// General configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Page blocked navigations are sent to
    pub sentinel_url: String,

    /// Default tracing filter (overridden by `RUST_LOG`)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sentinel_url: "moz-extension://redirect-guard/src/redirect/redirect.html".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Persistent store section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the JSON store file
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some("~/.local/share/redirect-guard/storage.json".to_string()),
        }
    }
}

/// Audit log section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum number of seen entries kept
    pub capacity: usize,

    /// Logging flag seeded on first activation
    pub logging_default: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_SEEN,
            logging_default: true,
        }
    }
}

/// Rule seeding section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rules written to the store when none exist
    pub defaults: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            defaults: default_rules(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub storage: StorageConfig,
    pub audit: AuditConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// First existing config file among the standard locations
    pub fn locate() -> Option<PathBuf> {
        let config_paths = [
            // User-specific config
            dirs::config_dir().map(|p| p.join("redirect-guard/config.toml")),
            // System-wide config
            Some(PathBuf::from("/etc/redirect-guard/config.toml")),
        ];

        config_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.general.sentinel_url.is_empty() {
            return Err(GuardError::Config("general.sentinel_url must not be empty".to_string()));
        }
        if self.audit.capacity == 0 {
            return Err(GuardError::Config("audit.capacity must be at least 1".to_string()));
        }
        for rule in &self.rules.defaults {
            validate_rule(rule).map_err(|e| GuardError::InvalidRule {
                rule: rule.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Expand ~ in path strings
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get the store path (expanded); `None` means in-memory
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage.path.as_ref().map(|p| Self::expand_path(p))
    }
}

/// Embedded default configuration
pub const DEFAULT_CONFIG_TOML: &str = r#"
[general]
sentinel_url = "moz-extension://redirect-guard/src/redirect/redirect.html"
log_level = "info"

[storage]
path = "~/.local/share/redirect-guard/storage.json"

[audit]
capacity = 300
logging_default = true

[rules]
defaults = [
    "youtube.com/shorts/*",
    "tiktok.com/*",
    "instagram.com/*",
]
"#;
