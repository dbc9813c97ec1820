//! Cable CLI
//!
//! Publishes broadcasts through a bridged in-process adapter, forwarding them
//! to an external broadcast server (or stdout when none is configured).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{debug, info, warn};

use cable::config::CableConfig;
use cable::sinks::StdoutSink;
use cable::{logging, relay};
use cable_bridge::{
    BridgedAdapter, CableServer, ExternalSink, HttpSink, InlineAdapter, SubscriptionAdapter,
    callback, extend_adapter,
};
use cable_codec::{LocatorRegistry, ValueCodec};

/// Cable broadcast bridge
#[derive(Parser, Debug)]
#[command(name = "cable")]
#[command(about = "Forward local broadcasts to an external broadcast server", long_about = None)]
struct Args {
    /// Path to the config file (defaults to ./cable.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broadcast endpoint, overrides the config file
    #[arg(long, env = "CABLE_BROADCAST_URL")]
    broadcast_url: Option<String>,

    /// Broadcast bearer key, overrides the config file
    #[arg(long, env = "CABLE_BROADCAST_KEY", hide_env_values = true)]
    broadcast_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Broadcast a single message
    Publish {
        /// Channel (stream) name
        channel: String,

        /// Message text
        message: String,

        /// Treat the message as a JSON value and re-encode it
        #[arg(long)]
        json: bool,
    },

    /// Relay JSON broadcast requests read from stdin, one per line
    Relay,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let mut config = CableConfig::load_or_default(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    if let Some(url) = args.broadcast_url {
        config.broadcast.url = Some(url);
    }
    if let Some(key) = args.broadcast_key {
        config.broadcast.key = Some(key);
    }

    logging::init(&config.log);
    info!("Starting cable v{}", env!("CARGO_PKG_VERSION"));

    let sink = build_sink(&config)?;
    let adapter = extend_adapter(
        Arc::new(InlineAdapter::new()),
        sink,
        config.broadcast.forwarder_config(),
    )?;

    match args.command {
        Command::Publish {
            channel,
            message,
            json,
        } => publish(&adapter, &channel, &message, json).await,
        Command::Relay => run_relay(&adapter).await,
    }
}

/// HTTP sink when a URL is configured, stdout otherwise
fn build_sink(config: &CableConfig) -> Result<Arc<dyn ExternalSink>> {
    match config.broadcast.http_sink_config() {
        Some(sink_config) => {
            let sink = HttpSink::new(sink_config).context("Failed to create HTTP sink")?;
            info!("Forwarding broadcasts to {}", sink.url());
            Ok(Arc::new(sink))
        }
        None => {
            info!("No broadcast URL configured, writing broadcasts to stdout");
            Ok(Arc::new(StdoutSink::stdout()))
        }
    }
}

async fn publish(
    adapter: &Arc<BridgedAdapter>,
    channel: &str,
    message: &str,
    json: bool,
) -> Result<()> {
    // Local echo so delivery on the in-process side is visible
    let channel_name = channel.to_string();
    let echo = callback(move |msg| debug!(channel = %channel_name, message = %msg, "Local delivery"));
    adapter.subscribe(channel, Arc::clone(&echo));

    if json {
        let server = CableServer::new(adapter.clone(), ValueCodec::new(LocatorRegistry::new()));
        let value = server
            .decode(message)
            .context("Message is not valid JSON")?;
        server.broadcast(channel, &value);
    } else {
        adapter.broadcast(channel, message);
    }

    adapter.flush().await;
    adapter.unsubscribe(channel, &echo);

    let stats = adapter.stats().unwrap_or_default();
    if stats.forwarded == 0 {
        bail!(
            "Broadcast was not accepted by the external sink (failed: {}, timed out: {}, dropped: {})",
            stats.failed,
            stats.timed_out,
            stats.dropped
        );
    }

    info!(channel = %channel, "Broadcast published");
    Ok(())
}

async fn run_relay(adapter: &Arc<BridgedAdapter>) -> Result<()> {
    info!("Relaying broadcast requests from stdin");

    let reader = BufReader::new(tokio::io::stdin());
    let adapter_ref: &dyn SubscriptionAdapter = adapter.as_ref();

    tokio::select! {
        result = relay::run(reader, adapter_ref) => {
            let stats = result.context("Failed to read stdin")?;
            info!(relayed = stats.relayed, skipped = stats.skipped, "Input finished");
            adapter.flush().await;
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, abandoning pending forwards");
        }
    }

    adapter.shutdown();

    if let Some(stats) = adapter.stats() {
        info!(
            forwarded = stats.forwarded,
            failed = stats.failed,
            timed_out = stats.timed_out,
            dropped = stats.dropped,
            "Relay stopped"
        );
        if stats.failed + stats.timed_out + stats.dropped > 0 {
            warn!("Some broadcasts did not reach the external sink");
        }
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
