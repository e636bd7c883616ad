//! Line-delimited JSON host
//!
//! Stands in for the browser's event source: each stdin line is one event
//! envelope, handled as its own task; replies and tab navigations are
//! written to stdout as they happen.
//!
//! Input:  `{"id": 1, "kind": "beforeRequest", "details": {...}}`
//! Output: `{"kind": "response", "id": 1, "body": {"cancel": true}}`
//!         `{"kind": "navigate", "tabId": 4, "url": "..."}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::audit::AuditLog;
use crate::config::Config;
use crate::engine::{RedirectEngine, Sentinel};
use crate::error::{GuardError, Result};
use crate::input::{NavigationDetails, RequestDetails};
use crate::live_config::LiveConfig;
use crate::messages::{CommandHandler, Response};
use crate::navigator::{ChannelNavigator, NavigateRequest};
use crate::storage::Store;

/// One inbound event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostEvent {
    /// Extension installed or updated
    Installed,

    /// Cancelable pre-navigation request
    BeforeRequest { details: RequestDetails },

    /// In-page history-state update
    HistoryStateUpdated { details: NavigationDetails },

    /// Committed navigation
    Committed { details: NavigationDetails },

    /// Settings UI message
    Message { message: Value },
}

/// Parse an envelope line into its optional id and event
pub fn parse_envelope(line: &str) -> Result<(Option<u64>, HostEvent)> {
    let value: Value = serde_json::from_str(line)?;
    let id = value.get("id").and_then(Value::as_u64);
    let event = serde_json::from_value(value)?;
    Ok((id, event))
}

/// One outbound line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostOutput {
    Response {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        body: Value,
    },
    Navigate {
        #[serde(rename = "tabId")]
        tab_id: i64,
        url: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        error: String,
    },
}

impl From<NavigateRequest> for HostOutput {
    fn from(req: NavigateRequest) -> Self {
        HostOutput::Navigate {
            tab_id: req.tab_id,
            url: req.url,
        }
    }
}

/// Event dispatcher over the engine and command handler
pub struct Host {
    engine: Arc<RedirectEngine>,
    commands: Arc<CommandHandler>,
}

impl Host {
    /// Create a host from its parts
    pub fn new(engine: Arc<RedirectEngine>, commands: Arc<CommandHandler>) -> Self {
        Self { engine, commands }
    }

    /// Wire up a host over a store from configuration
    ///
    /// Returns the host and the receiving end of its tab navigations.
    pub fn build(config: &Config, store: Arc<dyn Store>) -> (Self, mpsc::UnboundedReceiver<NavigateRequest>) {
        let live = Arc::new(LiveConfig::with_defaults(
            store.clone(),
            config.rules.defaults.clone(),
            config.audit.logging_default,
        ));
        let audit = Arc::new(
            AuditLog::with_capacity(store.clone(), config.audit.capacity)
                .with_default_enabled(config.audit.logging_default),
        );
        let (navigator, navigations) = ChannelNavigator::channel();

        let engine = Arc::new(RedirectEngine::new(
            Sentinel::new(config.general.sentinel_url.clone()),
            live,
            audit.clone(),
            Arc::new(navigator),
        ));
        let commands = Arc::new(CommandHandler::new(store, audit));

        (Self::new(engine, commands), navigations)
    }

    /// The redirect engine
    pub fn engine(&self) -> &Arc<RedirectEngine> {
        &self.engine
    }

    /// Start following store changes, then compile the persisted rules
    pub async fn start(&self) -> JoinHandle<()> {
        let config = self.engine.config();
        let watcher = config.watch_store();

        match config.load_and_compile().await {
            Ok(rules) => tracing::info!(
                active = rules.len(),
                rejected = rules.rejected().len(),
                "Rules loaded"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to load rules, starting empty"),
        }

        watcher
    }

    /// Handle one event and produce its reply body
    pub async fn dispatch(&self, event: HostEvent) -> Result<Value> {
        match event {
            HostEvent::Installed => {
                self.engine.config().on_installed().await?;
                Ok(serde_json::to_value(Response::ok())?)
            }
            HostEvent::BeforeRequest { details } => {
                let response = self.engine.on_before_request(&details).await;
                Ok(serde_json::to_value(response)?)
            }
            HostEvent::HistoryStateUpdated { details } => {
                let decision = self.engine.on_history_state_updated(&details).await;
                Ok(serde_json::to_value(decision)?)
            }
            HostEvent::Committed { details } => {
                let decision = self.engine.on_committed(&details).await;
                Ok(serde_json::to_value(decision)?)
            }
            HostEvent::Message { message } => {
                let response = self.commands.handle_value(message).await?;
                Ok(serde_json::to_value(response)?)
            }
        }
    }

    /// Handle one input line
    pub async fn handle_line(&self, line: &str) -> HostOutput {
        let (id, event) = match parse_envelope(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected envelope");
                return HostOutput::Error {
                    id: None,
                    error: format!("invalid envelope: {}", e),
                };
            }
        };

        match self.dispatch(event).await {
            Ok(body) => HostOutput::Response { id, body },
            Err(e) => {
                tracing::warn!(error = %e, ?id, "Event failed");
                HostOutput::Error {
                    id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Serve envelopes from `input` until EOF
    ///
    /// Every line runs as its own task. Returns once all tasks have finished
    /// and their output has been written.
    pub async fn run<R, W>(
        self: Arc<Self>,
        input: R,
        output: W,
        navigations: mpsc::UnboundedReceiver<NavigateRequest>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<HostOutput>();
        let writer = tokio::spawn(write_outputs(output, out_rx, navigations));

        let mut tasks = JoinSet::new();
        let mut lines = BufReader::new(input).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let host = Arc::clone(&self);
            let out = out_tx.clone();
            tasks.spawn(async move {
                let reply = host.handle_line(&line).await;
                let _ = out.send(reply);
            });
            reap_finished(&mut tasks);
        }

        while let Some(joined) = tasks.join_next().await {
            report_panic(joined);
        }
        self.engine.flush_audit().await;
        drop(out_tx);

        writer
            .await
            .map_err(|e| GuardError::Io(std::io::Error::other(e)))?
    }
}

/// Drop finished event tasks; returns how many were reaped
fn reap_finished(tasks: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = tasks.try_join_next() {
        report_panic(joined);
        reaped += 1;
    }
    reaped
}

fn report_panic(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Event task panicked");
    }
}

async fn write_outputs<W>(
    mut output: W,
    mut replies: mpsc::UnboundedReceiver<HostOutput>,
    mut navigations: mpsc::UnboundedReceiver<NavigateRequest>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            Some(req) = navigations.recv() => write_line(&mut output, &HostOutput::from(req)).await?,
            reply = replies.recv() => match reply {
                Some(reply) => write_line(&mut output, &reply).await?,
                None => break,
            },
        }
    }

    // Navigations issued by the last tasks
    while let Ok(req) = navigations.try_recv() {
        write_line(&mut output, &HostOutput::from(req)).await?;
    }
    output.flush().await?;
    Ok(())
}

async fn write_line<W>(output: &mut W, message: &HostOutput) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}
