//! Streaming range proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Player                    ┌──────────────────────────────────────────────┐
//!     ──── GET /api/proxy ─────▶│ http::server ──▶ proxy::handler              │
//!          Range: bytes=S-      │                    │                         │
//!                               │                    ▼                         │
//!                               │              proxy::range  (negotiate S-E)   │
//!                               │                    │                         │
//!                               │                    ▼                         │
//!                               │              proxy::upstream ───────────────┼──▶ Origin
//!                               │                    │                         │
//!     ◀─── 206 + chunked body ──┼── proxy::relay ◀───┘  (bounded channel)     │◀── bytes
//!                               │                                              │
//!     ──── GET /api/resolve ───▶│ resolver::{play_api, heuristic}              │
//!     ──── GET /api/metadata ──▶│ metadata (HEAD probe)                        │
//!                               └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use stream_proxy::config::loader::load_config;
use stream_proxy::config::ProxyConfig;
use stream_proxy::lifecycle::signals::wait_for_signal;
use stream_proxy::observability::{logging, metrics};
use stream_proxy::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "stream-proxy", version, about = "Range-bounded video streaming proxy")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);

    tracing::info!("stream-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        chunk_size = config.relay.chunk_size,
        buffer_chunks = config.relay.buffer_chunks,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
