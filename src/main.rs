//! Forward HTTP/HTTPS proxy.
//!
//! A proxy built on Tokio that relays raw bytes between clients and origins.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  FORWARD PROXY                   │
//!                         │                                                  │
//!     Client              │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!     ────────────────────┼─▶│   net    │──▶│   http   │──▶│   handler   │   │
//!                         │  │ listener │   │  server  │   │ read+route  │   │
//!                         │  └──────────┘   └────┬─────┘   └──────┬──────┘   │
//!                         │                      │                │          │
//!                         │                 ┌────▼─────┐   ┌──────▼──────┐   │
//!                         │                 │   pool   │   │   connect   │   │
//!                         │                 │ (bounded)│   │  / forward  │   │
//!                         │                 └──────────┘   └──────┬──────┘   │
//!                         │                                       │          │
//!     Client              │                ┌──────────┐           │          │     Origin
//!     ◀───────────────────┼────────────────│  relay   │◀──────────┘──────────┼───▶ Server
//!                         │                └──────────┘                      │
//!                         │  ┌────────────────────────────────────────────┐  │
//!                         │  │ config │ lifecycle │ observability         │  │
//!                         │  └────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use forward_proxy::lifecycle::{shutdown_signal, Shutdown};
use forward_proxy::observability::{logging, metrics};
use forward_proxy::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "forward-proxy")]
#[command(about = "Forward HTTP/HTTPS proxy with CONNECT tunneling", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address or hostname to bind
    #[arg(short, long)]
    listen: Option<String>,

    /// CONNECT tunnel relay deadline in seconds
    #[arg(long)]
    tunnel_timeout: Option<u64>,

    /// Plain HTTP relay deadline in seconds
    #[arg(long)]
    relay_timeout: Option<u64>,

    /// Maximum concurrently served connections
    #[arg(long)]
    max_workers: Option<usize>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(listen) = self.listen {
            config.listener.address = listen;
        }
        if let Some(secs) = self.tunnel_timeout {
            config.timeouts.connect_tunnel_secs = secs;
        }
        if let Some(secs) = self.relay_timeout {
            config.timeouts.http_relay_secs = secs;
        }
        if let Some(workers) = self.max_workers {
            config.pool.max_workers = Some(workers);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    let mut config = match args.config.take() {
        Some(path) => load_config(&path)?,
        None => ProxyConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        listen = %config.listener.address,
        port = config.listener.port,
        tunnel_timeout_secs = config.timeouts.connect_tunnel_secs,
        relay_timeout_secs = config.timeouts.http_relay_secs,
        max_workers = config.pool.effective_max_workers(),
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

    let server = ProxyServer::new(config);
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(error = %error, "Startup failed");
            return Err(error.into());
        }
    };

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        if !shutdown.trigger() {
            tracing::debug!("Accept loop already stopped");
        }
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
