//! Seed rules written to the store on first activation
//!
//! Covers the three short-form video hosts.

/// Default destination rules, in the order they are persisted
pub const DEFAULT_RULES: &[&str] = &[
    "youtube.com/shorts/*",
    "tiktok.com/*",
    "instagram.com/*",
];

/// Owned copy of [`DEFAULT_RULES`] for writing to the store
pub fn default_rules() -> Vec<String> {
    DEFAULT_RULES.iter().map(|r| r.to_string()).collect()
}
