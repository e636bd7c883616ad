//! Integration tests for the line-delimited JSON host

use std::sync::Arc;

use redirect_guard::host::Host;
use redirect_guard::storage::MemoryStore;
use redirect_guard::{Config, StorageKey};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

const SENTINEL: &str = "moz-extension://guard/blocked.html";

fn config() -> Config {
    let mut config = Config::default();
    config.general.sentinel_url = SENTINEL.to_string();
    config
}

/// Run the host over `input` and collect every output line
async fn serve(store: Arc<MemoryStore>, input: &str) -> Vec<Value> {
    let (host, navigations) = Host::build(&config(), store);
    let host = Arc::new(host);
    let watcher = host.start().await;

    let (writer, mut reader) = tokio::io::duplex(1 << 16);
    host.run(input.as_bytes(), writer, navigations).await.unwrap();
    watcher.abort();

    let mut out = String::new();
    reader.read_to_string(&mut out).await.unwrap();
    out.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn reply(outputs: &[Value], id: u64) -> &Value {
    outputs
        .iter()
        .find(|o| o["kind"] != "navigate" && o["id"] == id)
        .unwrap_or_else(|| panic!("no reply for id {}", id))
}

fn navigations(outputs: &[Value]) -> Vec<&Value> {
    outputs.iter().filter(|o| o["kind"] == "navigate").collect()
}

fn seeded(rules: Value) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_values([(StorageKey::DestinationRules, rules)]))
}

#[tokio::test]
async fn test_blocked_request_cancels_and_navigates() {
    let outputs = serve(
        seeded(json!(["tiktok.com/*"])),
        r#"{"id":1,"kind":"beforeRequest","details":{"url":"https://tiktok.com/@a","tabId":3}}"#,
    )
    .await;

    assert_eq!(
        reply(&outputs, 1),
        &json!({"kind": "response", "id": 1, "body": {"cancel": true}})
    );
    assert_eq!(
        navigations(&outputs),
        vec![&json!({"kind": "navigate", "tabId": 3, "url": SENTINEL})]
    );
}

#[tokio::test]
async fn test_allowed_request_has_empty_body() {
    let outputs = serve(
        seeded(json!(["tiktok.com/*"])),
        r#"{"id":2,"kind":"beforeRequest","details":{"url":"https://example.com/","tabId":3}}"#,
    )
    .await;

    assert_eq!(reply(&outputs, 2)["body"], json!({}));
    assert!(navigations(&outputs).is_empty());
}

#[tokio::test]
async fn test_every_line_is_answered() {
    let input = [
        r#"{"id":1,"kind":"beforeRequest","details":{"url":"https://youtube.com/shorts/x","tabId":1}}"#,
        r#"{"id":2,"kind":"historyStateUpdated","details":{"url":"https://tiktok.com/@b","tabId":2,"frameId":0}}"#,
        r#"{"id":3,"kind":"committed","details":{"url":"https://tiktok.com/@c","tabId":3,"frameId":1}}"#,
        "",
        r#"{"id":4,"kind":"message","message":{"type":"LIST_RULES"}}"#,
        r#"{"id":5,"kind":"message","message":{"type":"NOPE"}}"#,
    ]
    .join("\n");

    let outputs = serve(seeded(json!(["youtube.com/shorts/*", "tiktok.com/*"])), &input).await;

    assert_eq!(reply(&outputs, 1)["body"], json!({"cancel": true}));
    assert_eq!(reply(&outputs, 2)["body"]["decision"], "redirect");
    assert_eq!(reply(&outputs, 2)["body"]["source"], "SPA-historyState");
    assert_eq!(reply(&outputs, 3)["body"]["decision"], "allow");
    assert_eq!(
        reply(&outputs, 4)["body"],
        json!({"rules": ["youtube.com/shorts/*", "tiktok.com/*"]})
    );
    assert_eq!(reply(&outputs, 5)["body"], json!({}));

    let mut tabs: Vec<i64> = navigations(&outputs)
        .iter()
        .map(|n| n["tabId"].as_i64().unwrap())
        .collect();
    tabs.sort_unstable();
    assert_eq!(tabs, vec![1, 2]);
}

#[tokio::test]
async fn test_installed_seeds_defaults() {
    let store = Arc::new(MemoryStore::new());
    let outputs = serve(store.clone(), r#"{"id":1,"kind":"installed"}"#).await;

    assert_eq!(reply(&outputs, 1)["body"], json!({"ok": true}));
    assert_eq!(
        store.snapshot()[&StorageKey::DestinationRules],
        json!(["youtube.com/shorts/*", "tiktok.com/*", "instagram.com/*"])
    );
    assert_eq!(store.snapshot()[&StorageKey::LoggingEnabled], json!(true));
}

#[tokio::test]
async fn test_malformed_envelope_reports_error() {
    let outputs = serve(seeded(json!([])), "{not json\n{\"id\":9,\"kind\":\"reboot\"}").await;

    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(|o| o["kind"] == "error"));
    assert!(outputs.iter().all(|o| o.get("id").is_none()));
}

#[tokio::test]
async fn test_blocked_request_is_logged() {
    let store = seeded(json!(["instagram.com/*"]));
    let input = r#"{"id":1,"kind":"beforeRequest","details":{"url":"https://www.google.com/url?q=https%3A%2F%2Finstagram.com%2Fp%2F1","tabId":7}}"#;
    serve(store.clone(), input).await;

    let seen = &store.snapshot()[&StorageKey::SeenUrls];
    assert_eq!(seen[0]["url"], "https://instagram.com/p/1");
    assert_eq!(seen[0]["source"], "Google-wrapped");
    assert_eq!(seen[0]["matchedRule"], "instagram.com/*");
}
