//! Live rule configuration
//!
//! Owns the active [`CompiledRuleSet`] and keeps it in step with the rule
//! list in the store. The set is published through a `watch` channel as an
//! `Arc`, so a classification clones one snapshot and never sees a
//! half-replaced set.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::rules::{default_rules, CompiledRuleSet};
use crate::storage::{self, StorageChange, StorageKey, Store};

/// Active rule set, recompiled on store changes
pub struct LiveConfig {
    store: Arc<dyn Store>,
    defaults: Vec<String>,
    default_logging: bool,
    rules_tx: watch::Sender<Arc<CompiledRuleSet>>,
}

impl LiveConfig {
    /// Create with the built-in default rules; the active set starts empty
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_defaults(store, default_rules(), true)
    }

    /// Create with explicit seed rules and logging default
    pub fn with_defaults(store: Arc<dyn Store>, defaults: Vec<String>, default_logging: bool) -> Self {
        let (rules_tx, _) = watch::channel(Arc::new(CompiledRuleSet::empty()));
        Self {
            store,
            defaults,
            default_logging,
            rules_tx,
        }
    }

    /// Current rule set
    pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
        self.rules_tx.borrow().clone()
    }

    /// Receive every future rule set
    pub fn subscribe(&self) -> watch::Receiver<Arc<CompiledRuleSet>> {
        self.rules_tx.subscribe()
    }

    /// Seed rules the store falls back to
    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// Compile a rule list and make it the active set
    pub fn replace<S: AsRef<str>>(&self, rules: &[S]) -> Arc<CompiledRuleSet> {
        let compiled = Arc::new(CompiledRuleSet::compile(rules));
        tracing::debug!(
            active = compiled.len(),
            rejected = compiled.rejected().len(),
            "Rule set replaced"
        );
        self.rules_tx.send_replace(compiled.clone());
        compiled
    }

    /// Seed missing rules and logging flag (first activation)
    pub async fn ensure_initialized(&self) -> Result<()> {
        let store = self.store.as_ref();

        if storage::load_rules(store).await?.is_none() {
            tracing::info!(count = self.defaults.len(), "Seeding default rules");
            storage::save_rules(store, &self.defaults).await?;
        }

        if storage::load_logging_enabled(store).await?.is_none() {
            storage::save_logging_enabled(store, self.default_logging).await?;
        }

        Ok(())
    }

    /// First-activation handler: seed, then compile
    pub async fn on_installed(&self) -> Result<Arc<CompiledRuleSet>> {
        self.ensure_initialized().await?;
        self.load_and_compile().await
    }

    /// Compile whatever rule list is persisted, or the defaults if none
    pub async fn load_and_compile(&self) -> Result<Arc<CompiledRuleSet>> {
        let rules = storage::load_rules(self.store.as_ref())
            .await?
            .unwrap_or_else(|| self.defaults.clone());
        Ok(self.replace(&rules))
    }

    /// React to a store change; returns whether the rule set was replaced
    ///
    /// A removed rule list compiles to an empty set, not the defaults.
    pub fn apply_change(&self, change: &StorageChange) -> bool {
        if change.key != StorageKey::DestinationRules {
            return false;
        }

        let rules = change
            .new_value
            .as_ref()
            .and_then(storage::rules_from_value)
            .unwrap_or_default();
        self.replace(&rules);
        true
    }

    /// Follow store changes in a background task
    ///
    /// Subscribes before returning, so no change made afterwards is missed.
    pub fn watch_store(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.subscribe();
        let config = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if config.apply_change(&change) {
                            tracing::info!("Rules recompiled after store change");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Missed store changes, reloading rules");
                        if let Err(e) = config.reload_after_lag().await {
                            tracing::error!(error = %e, "Failed to reload rules");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn reload_after_lag(&self) -> Result<()> {
        let rules = storage::load_rules(self.store.as_ref())
            .await?
            .unwrap_or_default();
        self.replace(&rules);
        Ok(())
    }
}
