//! redirect-guard - Divert matching page navigations to a local blocked page
//!
//! This library decides, for each top-level navigation, whether to send the
//! tab to a sentinel page instead, and records each diversion in a bounded
//! audit log.
//!
//! # Features
//!
//! - **Rule compilation**: plain regex bodies or `/body/flags` rules; invalid rules are skipped
//! - **Redirector unwrapping**: search-engine `url?q=...` links are judged by their destination
//! - **Single-page apps**: history-state updates and commits are caught after the fact
//! - **Audit logging**: newest-first, capped at 300 entries, switchable at runtime
//! - **Live configuration**: rule edits in the store recompile the active set atomically
//!
//! # Example
//!
//! ```
//! use redirect_guard::engine::{decide_url, Sentinel};
//! use redirect_guard::rules::compile;
//!
//! let rules = compile(&["youtube.com/shorts/*"]);
//! let sentinel = Sentinel::new("moz-extension://guard/blocked.html");
//!
//! let decision = decide_url("https://youtube.com/shorts/abc", &sentinel, &rules);
//! assert!(decision.is_redirect());
//! assert_eq!(decision.matched_rule(), Some("youtube.com/shorts/*"));
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod input;
pub mod live_config;
pub mod logging;
pub mod messages;
pub mod navigator;
pub mod output;
pub mod parser;
pub mod rules;
pub mod storage;

// Re-exports for convenience
pub use audit::{AuditLog, AuditQueue, MatchRecord, SeenEntry, MAX_SEEN};
pub use config::Config;
pub use engine::{Classification, NavigationEvent, RedirectEngine, Sentinel};
pub use error::{GuardError, Result};
pub use input::{NavigationDetails, RequestDetails};
pub use live_config::LiveConfig;
pub use messages::{Command, CommandHandler, Response};
pub use navigator::TabNavigator;
pub use output::{BlockingResponse, Decision, MatchSource};
pub use rules::{compile, CompiledRuleSet};
pub use storage::{Store, StorageKey};
