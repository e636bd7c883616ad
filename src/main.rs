//! redirect-guard - Divert matching page navigations to a local blocked page
//!
//! # Usage
//!
//! ```bash
//! # Serve line-delimited JSON events on stdin, replies on stdout
//! echo '{"id":1,"kind":"beforeRequest","details":{"url":"https://tiktok.com/@a","tabId":3}}' | redirect-guard
//!
//! # Dry-run one URL against the persisted rules
//! redirect-guard check https://youtube.com/shorts/abc
//!
//! # Show active and rejected rules
//! redirect-guard rules
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use redirect_guard::{
    config::Config,
    engine::{decide_url, Sentinel},
    host::Host,
    logging::init_tracing,
    storage::{self, JsonFileStore, MemoryStore, Store},
    LiveConfig,
};

#[derive(Debug, Parser)]
#[command(name = "redirect-guard", version, about)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "REDIRECT_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the JSON store (overrides config)
    #[arg(short, long, env = "REDIRECT_GUARD_STORE")]
    store: Option<PathBuf>,

    /// Keep state in memory only
    #[arg(long, conflicts_with = "store")]
    memory: bool,

    /// Sentinel URL (overrides config)
    #[arg(long)]
    sentinel: Option<String>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve events from stdin (default)
    Serve,

    /// Decide one URL against the persisted rules without side effects
    Check { url: String },

    /// List active and rejected rules
    Rules,
}

async fn open_store(cli: &Cli, config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if cli.memory {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = cli.store.clone().or_else(|| config.storage_path());
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using store file");
            Ok(Arc::new(JsonFileStore::open(path).await?))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; an explicit --config must parse
    let (mut config, load_error) = match cli.config.clone().or_else(Config::locate) {
        Some(path) => match Config::load_from(&path) {
            Ok(config) => (config, None),
            Err(e) if cli.config.is_some() => return Err(e.into()),
            Err(e) => (Config::default(), Some((path, e))),
        },
        None => (Config::default(), None),
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.general.log_level));

    if let Some((path, e)) = load_error {
        tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
    }

    if let Some(ref sentinel) = cli.sentinel {
        config.general.sentinel_url = sentinel.clone();
    }

    let store = open_store(&cli, &config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting redirect-guard");

            let (host, navigations) = Host::build(&config, store);
            let host = Arc::new(host);
            let watcher = host.start().await;

            host.run(tokio::io::stdin(), tokio::io::stdout(), navigations)
                .await?;

            watcher.abort();
            tracing::info!("Input closed, shutting down");
        }
        Command::Check { url } => {
            let live = LiveConfig::with_defaults(
                store,
                config.rules.defaults.clone(),
                config.audit.logging_default,
            );
            let rules = live.load_and_compile().await?;
            let sentinel = Sentinel::new(config.general.sentinel_url.clone());

            println!("{}", decide_url(&url, &sentinel, &rules).to_json());
        }
        Command::Rules => {
            let rules = storage::load_rules(store.as_ref())
                .await?
                .unwrap_or_else(|| config.rules.defaults.clone());
            let compiled = redirect_guard::compile(&rules);

            for rule in compiled.sources() {
                println!("active    {}", rule);
            }
            for rejected in compiled.rejected() {
                println!("rejected  {}  ({})", rejected.source, rejected.error);
            }
        }
    }

    Ok(())
}
