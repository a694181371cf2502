//! rulegate
//!
//! Keeps proxy and rule providers fresh and routes connections over them.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                           CORE                               │
//!   │                                                              │
//!   │  vehicle ──▶ fetcher ──▶ provider ──┬──▶ health check        │
//!   │  (file/http)  (hash, loop)          │                        │
//!   │                                     └──▶ rule snapshot       │
//!   │                                                │             │
//!   │  Metadata ─────────────────────────▶ router ◀──┘             │
//!   │                                       │                      │
//!   │                                       ▼                      │
//!   │                                 adapter name                 │
//!   │                                                              │
//!   │  config + watcher · signals · control registry · metrics     │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use rulegate::config::watcher::ConfigWatcher;
use rulegate::config::{load_config, RulegateConfig};
use rulegate::control::RuleSnapshot;
use rulegate::lifecycle::{signals, Core, Shutdown, SignalEvent};
use rulegate::observability::{logging, metrics};
use rulegate::provider::DOWNLOAD_TIMEOUT;
use rulegate::Metadata;

#[derive(Parser)]
#[command(name = "rulegate")]
#[command(about = "Rule-based routing core with refreshable proxy and rule providers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "rulegate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep providers fresh until interrupted
    Run,
    /// Load every provider once and print their state as JSON
    Check,
    /// Route one connection and print the chosen policy
    Match {
        /// Destination host name
        #[arg(long)]
        host: Option<String>,
        /// Destination IP (also used when --host is set, as the resolved address)
        #[arg(long)]
        ip: Option<IpAddr>,
        #[arg(long, default_value_t = 443)]
        port: u16,
        #[arg(long)]
        src_ip: Option<IpAddr>,
        #[arg(long, default_value_t = 0)]
        src_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    match cli.command {
        Commands::Run => run(&cli.config, config).await,
        Commands::Check => check(&config).await,
        Commands::Match {
            host,
            ip,
            port,
            src_ip,
            src_port,
        } => {
            let mut metadata = Metadata {
                host: host.unwrap_or_default(),
                dst_ip: ip,
                dst_port: port,
                ..Default::default()
            };
            if let Some(src) = src_ip {
                metadata = metadata.with_source(src, src_port);
            }
            route_one(&config, &metadata).await
        }
    }
}

async fn run(path: &Path, config: RulegateConfig) -> Result<(), Box<dyn Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rulegate starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut core = Core::build(&config)?;
    core.initial().await?;

    let shutdown = Shutdown::new();
    let mut shutdown_rx = shutdown.subscribe();
    let mut signal_rx = signals::spawn(shutdown.clone());

    let (watcher, mut reload_rx) = ConfigWatcher::new(path);
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, reload on SIGHUP only");
            None
        }
    };

    tracing::info!("Providers ready");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            Some(event) = signal_rx.recv() => match event {
                SignalEvent::Shutdown => break,
                SignalEvent::Reload => match load_config(path) {
                    Ok(next) => core = reload(core, &next).await,
                    Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
                },
            },
            Some(next) = reload_rx.recv() => core = reload(core, &next).await,
            else => break,
        }
    }

    tracing::info!("Shutting down");
    core.destroy();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Build and load the next core before letting go of the current one.
async fn reload(current: Core, config: &RulegateConfig) -> Core {
    let next = match Core::build(config) {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(error = %e, "Reload failed, keeping current configuration");
            return current;
        }
    };

    match next.initial().await {
        Ok(()) => {
            current.destroy();
            tracing::info!("Configuration reloaded");
            next
        }
        Err(e) => {
            tracing::error!(error = %e, "Reload failed, keeping current configuration");
            next.destroy();
            current
        }
    }
}

async fn check(config: &RulegateConfig) -> Result<(), Box<dyn Error>> {
    let core = Core::build(config)?;
    core.initial().await?;

    let registry = core.registry();
    for name in registry.proxy_providers().keys() {
        registry.health_check(name).await?;
    }
    let refreshed = registry.refresh_rule_providers(DOWNLOAD_TIMEOUT).await;
    tracing::debug!(?refreshed, "Rule providers refreshed");

    println!("{}", serde_json::to_string_pretty(&registry.snapshot(core.router()))?);
    core.destroy();
    Ok(())
}

async fn route_one(config: &RulegateConfig, metadata: &Metadata) -> Result<(), Box<dyn Error>> {
    let core = Core::build(config)?;
    core.initial().await?;

    let result = core.route(metadata);
    core.destroy();

    match result {
        Some(hit) => {
            println!("{}", serde_json::to_string_pretty(&RuleSnapshot::of(hit.rule.as_ref()))?);
            Ok(())
        }
        None => Err("no rule matched".into()),
    }
}
