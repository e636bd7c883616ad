//! Integration tests for the redirect engine

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redirect_guard::navigator::RecordingNavigator;
use redirect_guard::storage::{MemoryStore, StorageChange};
use redirect_guard::{
    AuditLog, LiveConfig, MatchSource, NavigationDetails, RedirectEngine, RequestDetails,
    SeenEntry, Sentinel, Store, StorageKey,
};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Semaphore};

const SENTINEL: &str = "moz-extension://guard/src/redirect/redirect.html";

struct Harness {
    engine: RedirectEngine,
    audit: Arc<AuditLog>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(rules: &[&str]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let live = Arc::new(LiveConfig::new(store.clone()));
    live.replace(rules);
    let audit = Arc::new(AuditLog::new(store));
    let navigator = Arc::new(RecordingNavigator::new());

    let engine = RedirectEngine::new(
        Sentinel::new(SENTINEL),
        live,
        audit.clone(),
        navigator.clone(),
    );

    Harness {
        engine,
        audit,
        navigator,
    }
}

/// Audit entries once every queued write has landed
async fn logged(h: &Harness) -> Vec<SeenEntry> {
    h.engine.flush_audit().await;
    h.audit.entries().await.unwrap()
}

/// Store whose audit-log writes wait for a permit
struct GatedStore {
    inner: MemoryStore,
    gate: Semaphore,
}

#[async_trait]
impl Store for GatedStore {
    async fn get(&self, key: StorageKey) -> redirect_guard::Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: StorageKey, value: Value) -> redirect_guard::Result<()> {
        if key == StorageKey::SeenUrls {
            self.gate.acquire().await.unwrap().forget();
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: StorageKey) -> redirect_guard::Result<()> {
        self.inner.remove(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.subscribe()
    }
}

// ============================================================================
// Request interception
// ============================================================================

#[tokio::test]
async fn test_plain_match_cancels_and_logs() {
    let h = harness(&["youtube.com/shorts/*"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://youtube.com/shorts/abc", 5))
        .await;

    assert!(response.is_cancel());
    assert_eq!(response.to_json(), r#"{"cancel":true}"#);

    let navs = h.navigator.requests();
    assert_eq!(navs.len(), 1);
    assert_eq!(navs[0].tab_id, 5);
    assert_eq!(navs[0].url, SENTINEL);

    let seen = logged(&h).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url, "https://youtube.com/shorts/abc");
    assert_eq!(seen[0].source, MatchSource::WebRequest);
    assert_eq!(seen[0].matched_rule.as_deref(), Some("youtube.com/shorts/*"));
}

#[tokio::test]
async fn test_wrapped_redirect_logs_destination() {
    let h = harness(&["instagram.com/*"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame(
            "https://www.google.com/url?q=https%3A%2F%2Finstagram.com%2Fp%2F1",
            2,
        ))
        .await;

    assert!(response.is_cancel());
    let seen = logged(&h).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url, "https://instagram.com/p/1");
    assert_eq!(seen[0].source, MatchSource::GoogleWrapped);
    assert_eq!(seen[0].matched_rule.as_deref(), Some("instagram.com/*"));
}

#[tokio::test]
async fn test_wrapped_without_destination_allows() {
    let h = harness(&["tiktok.com/*"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://www.google.com/url?foo=bar", 2))
        .await;

    assert!(!response.is_cancel());
    assert_eq!(response.to_json(), "{}");
    assert!(h.navigator.requests().is_empty());
    assert!(logged(&h).await.is_empty());
}

#[tokio::test]
async fn test_wrapped_first_rule_wins() {
    let h = harness(&["example\\.org", "tiktok", "tiktok.com/@"]);

    h.engine
        .on_before_request(&RequestDetails::main_frame(
            "https://news.google.co.uk/url?url=https://tiktok.com/@a",
            1,
        ))
        .await;

    let seen = logged(&h).await;
    assert_eq!(seen[0].matched_rule.as_deref(), Some("tiktok"));
}

#[tokio::test]
async fn test_delimited_rule_is_case_insensitive() {
    let h = harness(&[r"/tiktok\.com\/@.+/i"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://TikTok.com/@someuser", 9))
        .await;
    assert!(response.is_cancel());
}

#[tokio::test]
async fn test_invalid_rule_leaves_others_active() {
    let h = harness(&["(unterminated[", "tiktok.com/*"]);

    let rules = h.engine.config().snapshot();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules.rejected().len(), 1);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", 1))
        .await;
    assert!(response.is_cancel());
}

#[tokio::test]
async fn test_sentinel_is_never_redirected() {
    let h = harness(&[".*"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame(format!("{}?from=x", SENTINEL), 1))
        .await;

    assert!(!response.is_cancel());
    assert!(h.navigator.requests().is_empty());
    assert!(logged(&h).await.is_empty());
}

#[tokio::test]
async fn test_wrapped_to_sentinel_allows() {
    let h = harness(&[".*"]);

    let url = format!(
        "https://www.google.com/url?q={}",
        "moz-extension%3A%2F%2Fguard%2Fsrc%2Fredirect%2Fredirect.html"
    );
    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame(url, 1))
        .await;
    assert!(!response.is_cancel());
}

#[tokio::test]
async fn test_subframe_requests_ignored() {
    let h = harness(&["tiktok.com/*"]);

    let details = RequestDetails::from_json(
        r#"{"url":"https://tiktok.com/embed/1","tabId":3,"frameId":4,"type":"sub_frame"}"#,
    )
    .unwrap();
    let response = h.engine.on_before_request(&details).await;

    assert!(!response.is_cancel());
    assert!(logged(&h).await.is_empty());
}

#[tokio::test]
async fn test_closed_tab_still_cancels_and_logs() {
    let h = harness(&["tiktok.com/*"]);
    h.navigator.close_tab(8);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", 8))
        .await;

    assert!(response.is_cancel());
    assert!(h.navigator.requests().is_empty());
    assert_eq!(logged(&h).await.len(), 1);
}

#[tokio::test]
async fn test_request_outside_tab_cancels_without_navigation() {
    let h = harness(&["tiktok.com/*"]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", -1))
        .await;

    assert!(response.is_cancel());
    assert!(h.navigator.requests().is_empty());
    assert_eq!(logged(&h).await.len(), 1);
}

#[tokio::test]
async fn test_logging_disabled_still_redirects() {
    let h = harness(&["tiktok.com/*"]);
    h.audit.set_enabled(false).await.unwrap();

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", 4))
        .await;

    assert!(response.is_cancel());
    assert_eq!(h.navigator.requests().len(), 1);
    assert!(logged(&h).await.is_empty());
}

#[tokio::test]
async fn test_cancel_does_not_wait_for_audit_write() {
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        gate: Semaphore::new(0),
    });
    let live = Arc::new(LiveConfig::new(store.clone()));
    live.replace(&["tiktok.com/*"]);
    let audit = Arc::new(AuditLog::new(store.clone()));
    let engine = RedirectEngine::new(
        Sentinel::new(SENTINEL),
        live,
        audit.clone(),
        Arc::new(RecordingNavigator::new()),
    );

    // The store write is held back, yet the cancel comes back
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        engine.on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", 2)),
    )
    .await
    .expect("blocking response waited on the audit write");
    assert!(response.is_cancel());
    assert!(audit.entries().await.unwrap().is_empty());

    store.gate.add_permits(1);
    engine.flush_audit().await;
    assert_eq!(audit.entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_rule_set_allows_everything() {
    let h = harness(&[]);

    let response = h
        .engine
        .on_before_request(&RequestDetails::main_frame("https://tiktok.com/@a", 4))
        .await;
    assert!(!response.is_cancel());
}

// ============================================================================
// Single-page-app navigation
// ============================================================================

#[tokio::test]
async fn test_history_state_redirects_without_rule() {
    let h = harness(&["youtube.com/shorts/*"]);

    let decision = h
        .engine
        .on_history_state_updated(&NavigationDetails::new(
            6,
            "https://youtube.com/shorts/xyz",
            0,
        ))
        .await;

    assert!(decision.is_redirect());
    assert_eq!(h.navigator.requests().len(), 1);

    let seen = logged(&h).await;
    assert_eq!(seen[0].source, MatchSource::SpaHistoryState);
    assert_eq!(seen[0].matched_rule, None);
}

#[tokio::test]
async fn test_committed_redirects() {
    let h = harness(&["instagram.com/*"]);

    let decision = h
        .engine
        .on_committed(&NavigationDetails::new(6, "https://instagram.com/reels/1", 0))
        .await;

    assert_eq!(decision.source(), Some(MatchSource::SpaCommitted));
    let seen = logged(&h).await;
    assert_eq!(seen[0].source, MatchSource::SpaCommitted);
}

#[tokio::test]
async fn test_child_frame_navigation_ignored() {
    let h = harness(&["instagram.com/*"]);

    let decision = h
        .engine
        .on_committed(&NavigationDetails::new(6, "https://instagram.com/reels/1", 3))
        .await;

    assert!(decision.is_allow());
    assert!(h.navigator.requests().is_empty());
}

#[tokio::test]
async fn test_unparseable_navigation_ignored() {
    let h = harness(&["about"]);

    let decision = h
        .engine
        .on_history_state_updated(&NavigationDetails::new(6, "about blank", 0))
        .await;
    assert!(decision.is_allow());
}

#[tokio::test]
async fn test_spa_navigation_json() {
    let h = harness(&["tiktok.com/*"]);

    let decision = h
        .engine
        .on_history_state_updated(&NavigationDetails::new(1, "https://tiktok.com/@b", 0))
        .await;

    assert_eq!(
        serde_json::to_value(&decision).unwrap(),
        json!({
            "decision": "redirect",
            "url": "https://tiktok.com/@b",
            "source": "SPA-historyState",
            "matchedRule": null
        })
    );
}

// ============================================================================
// Audit log bounds
// ============================================================================

#[tokio::test]
async fn test_log_capped_oldest_evicted() {
    let h = harness(&["tiktok.com/*"]);

    for i in 0..301 {
        h.engine
            .on_before_request(&RequestDetails::main_frame(
                format!("https://tiktok.com/@user{}", i),
                1,
            ))
            .await;
    }

    let seen = logged(&h).await;
    assert_eq!(seen.len(), 300);
    assert_eq!(seen[0].url, "https://tiktok.com/@user300");
    assert_eq!(seen[299].url, "https://tiktok.com/@user1");
    assert!(seen.iter().all(|e| e.url != "https://tiktok.com/@user0"));
}
