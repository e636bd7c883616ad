//! Command interface for the settings UI
//!
//! Requests arrive as JSON objects tagged by `type`. Anything that does not
//! decode into a known command, including a known `type` with an ill-typed
//! payload, is [`Command::Unknown`] and answered with `{}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::audit::{AuditLog, SeenEntry};
use crate::error::Result;
use crate::rules::validate_rule;
use crate::storage::{self, Store};

/// A request from the settings UI
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Append a rule string
    AddRule { value: String },

    /// Remove the first rule equal to `value`
    RemoveRule { value: String },

    /// Current persisted rule list
    ListRules,

    /// Current audit log
    ListSeen,

    /// Empty the audit log
    ClearSeen,

    /// Turn recording on or off
    SetLogging { enabled: bool },

    /// Current logging flag
    GetLogging,

    /// Check whether a rule string compiles
    ValidateRule { value: String },

    /// Anything else
    #[serde(skip)]
    Unknown,
}

impl Command {
    /// Decode a message, falling back to [`Command::Unknown`]
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(Command::Unknown)
    }

    /// Decode a JSON string, falling back to [`Command::Unknown`]
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str::<Value>(json)
            .map(Self::from_value)
            .unwrap_or(Command::Unknown)
    }
}

/// Reply to a [`Command`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ok {
        ok: bool,
    },
    Rules {
        rules: Vec<String>,
    },
    Seen {
        seen: Vec<SeenEntry>,
    },
    Logging {
        #[serde(rename = "loggingEnabled")]
        logging_enabled: bool,
    },
    Validation {
        valid: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Empty {},
}

impl Response {
    /// `{ok: true}`
    pub fn ok() -> Self {
        Response::Ok { ok: true }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Executes commands against the store
pub struct CommandHandler {
    store: Arc<dyn Store>,
    audit: Arc<AuditLog>,
}

impl CommandHandler {
    /// Create a handler
    pub fn new(store: Arc<dyn Store>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Handle one command
    ///
    /// Rule edits are read-modify-write on the store; the live rule set picks
    /// them up through the store's change notification.
    pub async fn handle(&self, command: Command) -> Result<Response> {
        let store = self.store.as_ref();

        match command {
            Command::AddRule { value } => {
                let mut rules = storage::load_rules(store).await?.unwrap_or_default();
                rules.push(value);
                storage::save_rules(store, &rules).await?;
                Ok(Response::ok())
            }
            Command::RemoveRule { value } => {
                let mut rules = storage::load_rules(store).await?.unwrap_or_default();
                if let Some(idx) = rules.iter().position(|r| *r == value) {
                    rules.remove(idx);
                    storage::save_rules(store, &rules).await?;
                }
                Ok(Response::ok())
            }
            Command::ListRules => Ok(Response::Rules {
                rules: storage::load_rules(store).await?.unwrap_or_default(),
            }),
            Command::ListSeen => Ok(Response::Seen {
                seen: self.audit.entries().await?,
            }),
            Command::ClearSeen => {
                self.audit.clear().await?;
                Ok(Response::ok())
            }
            Command::SetLogging { enabled } => {
                self.audit.set_enabled(enabled).await?;
                Ok(Response::ok())
            }
            Command::GetLogging => Ok(Response::Logging {
                logging_enabled: self.audit.is_enabled().await?,
            }),
            Command::ValidateRule { value } => Ok(match validate_rule(&value) {
                Ok(()) => Response::Validation {
                    valid: true,
                    error: None,
                },
                Err(e) => Response::Validation {
                    valid: false,
                    error: Some(e.to_string()),
                },
            }),
            Command::Unknown => Ok(Response::Empty {}),
        }
    }

    /// Decode and handle a raw message
    pub async fn handle_value(&self, message: Value) -> Result<Response> {
        self.handle(Command::from_value(message)).await
    }
}
