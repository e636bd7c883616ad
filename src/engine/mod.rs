//! Redirect engine for redirect-guard
//!
//! One entry point per navigation event type, all converging on a
//! [`Decision`]. Request interception can cancel; the single-page-app
//! observers can only send the tab to the sentinel after the fact.

pub mod classify;

pub use classify::{classify, Classification, Sentinel};

use std::sync::Arc;

use crate::audit::{AuditLog, AuditQueue, MatchRecord};
use crate::input::{NavigationDetails, RequestDetails};
use crate::live_config::LiveConfig;
use crate::navigator::TabNavigator;
use crate::output::{BlockingResponse, Decision, MatchSource};
use crate::parser::is_well_formed;
use crate::rules::CompiledRuleSet;

/// Post-navigation event kinds observed for single-page apps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// In-page history-state update
    HistoryStateUpdated,

    /// Navigation committed
    Committed,
}

impl NavigationEvent {
    /// Audit tag for redirects from this event
    pub fn source(&self) -> MatchSource {
        match self {
            NavigationEvent::HistoryStateUpdated => MatchSource::SpaHistoryState,
            NavigationEvent::Committed => MatchSource::SpaCommitted,
        }
    }
}

/// The main redirect engine
pub struct RedirectEngine {
    sentinel: Sentinel,
    config: Arc<LiveConfig>,
    audit: Arc<AuditLog>,
    recorder: AuditQueue,
    navigator: Arc<dyn TabNavigator>,
}

impl RedirectEngine {
    /// Create an engine over the live rules, audit log, and tab navigator
    ///
    /// Starts the audit writer task, so this must run inside a tokio runtime.
    pub fn new(
        sentinel: Sentinel,
        config: Arc<LiveConfig>,
        audit: Arc<AuditLog>,
        navigator: Arc<dyn TabNavigator>,
    ) -> Self {
        let recorder = AuditQueue::spawn(audit.clone());
        Self {
            sentinel,
            config,
            audit,
            recorder,
            navigator,
        }
    }

    /// The sentinel page
    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// The live rule configuration
    pub fn config(&self) -> &Arc<LiveConfig> {
        &self.config
    }

    /// The audit log
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Decide on an intercepted request without side effects
    pub fn decide_before_request(&self, details: &RequestDetails) -> Decision {
        if !details.is_main_frame() {
            return Decision::allow("not a top-level document request");
        }
        decide_url(&details.url, &self.sentinel, &self.config.snapshot())
    }

    /// Handle an intercepted request: decide, record, redirect the tab
    ///
    /// The returned response cancels the request when it was diverted.
    pub async fn on_before_request(&self, details: &RequestDetails) -> BlockingResponse {
        let decision = self.decide_before_request(details);
        self.apply(details.tab_id, &decision).await;
        BlockingResponse::from_decision(&decision)
    }

    /// Decide on a post-navigation event without side effects
    pub fn decide_navigation(&self, details: &NavigationDetails, event: NavigationEvent) -> Decision {
        if !details.is_top_level() {
            return Decision::allow("not the top-level frame");
        }
        decide_spa_url(&details.url, event, &self.sentinel, &self.config.snapshot())
    }

    /// Handle an in-page history-state update
    pub async fn on_history_state_updated(&self, details: &NavigationDetails) -> Decision {
        self.on_navigation(details, NavigationEvent::HistoryStateUpdated)
            .await
    }

    /// Handle a committed navigation
    pub async fn on_committed(&self, details: &NavigationDetails) -> Decision {
        self.on_navigation(details, NavigationEvent::Committed).await
    }

    async fn on_navigation(&self, details: &NavigationDetails, event: NavigationEvent) -> Decision {
        let decision = self.decide_navigation(details, event);
        self.apply(details.tab_id, &decision).await;
        decision
    }

    /// Carry out a redirect decision: queue the audit entry and send the tab
    /// to the sentinel
    ///
    /// Failures are logged and never escape.
    async fn apply(&self, tab_id: i64, decision: &Decision) {
        let Some(record) = MatchRecord::from_decision(decision) else {
            tracing::trace!(?decision, "Allowed");
            return;
        };

        tracing::info!(
            url = %record.url,
            tab_id,
            source = %record.source,
            rule = record.matched_rule.as_deref().unwrap_or("-"),
            "Redirecting to sentinel"
        );

        // Recording is queued; the decision never waits on the store
        self.recorder.submit(record);

        // Requests outside a tab still cancel, but there is nothing to navigate
        if tab_id < 0 {
            return;
        }
        if let Err(e) = self.navigator.navigate(tab_id, self.sentinel.url()).await {
            tracing::error!(error = %e, tab_id, "Tab navigation failed");
        }
    }

    /// Wait for queued audit entries to reach the store
    pub async fn flush_audit(&self) {
        self.recorder.flush().await;
    }
}

/// Request-interception decision for one URL against a rule snapshot
pub fn decide_url(url: &str, sentinel: &Sentinel, rules: &CompiledRuleSet) -> Decision {
    match classify(url, sentinel) {
        Classification::AtSentinel => Decision::allow("already at sentinel"),
        wrapped @ Classification::WrappedRedirect(_) => {
            let Some(destination) = wrapped.destination(sentinel) else {
                return Decision::allow("redirector without usable destination");
            };
            match rules.find_match(destination) {
                Some(rule) => Decision::redirect(
                    destination,
                    MatchSource::GoogleWrapped,
                    Some(rule.source.clone()),
                ),
                None => Decision::allow("redirector destination matched no rule"),
            }
        }
        Classification::Plain => {
            if !is_well_formed(url) {
                return Decision::allow("unparseable url");
            }
            match rules.find_match(url) {
                Some(rule) => {
                    Decision::redirect(url, MatchSource::WebRequest, Some(rule.source.clone()))
                }
                None => Decision::allow("no rule matched"),
            }
        }
    }
}

/// Single-page-app decision: plain matching only, no rule attribution
pub fn decide_spa_url(
    url: &str,
    event: NavigationEvent,
    sentinel: &Sentinel,
    rules: &CompiledRuleSet,
) -> Decision {
    if sentinel.is_at(url) {
        return Decision::allow("already at sentinel");
    }
    if !is_well_formed(url) {
        return Decision::allow("unparseable url");
    }
    if rules.matches(url) {
        Decision::redirect(url, event.source(), None)
    } else {
        Decision::allow("no rule matched")
    }
}
