//! Proxy server: the accept loop and connection dispatch.
//!
//! # Responsibilities
//! - Accept connections sequentially on the bound listener
//! - Hand each one to the bounded worker pool without waiting
//! - Reclaim finished workers between accepts
//! - On shutdown: stop accepting, drain workers, abort stragglers

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::handler::serve_connection;
use crate::net::connection::Connection;
use crate::net::listener::{Listener, ListenerError};
use crate::net::pool::WorkerPool;
use crate::observability::metrics;

/// Pause after a failed accept so a persistent failure (e.g. EMFILE)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Forward HTTP/HTTPS proxy server.
pub struct ProxyServer {
    config: Arc<ProxyConfig>,
}

impl ProxyServer {
    /// Create a new proxy server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    /// Resolve and bind the configured listen address.
    pub async fn bind(&self) -> Result<Listener, ListenerError> {
        Listener::bind(&self.config.listener).await
    }

    /// Run the accept loop until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let mut pool = WorkerPool::new(self.config.pool.effective_max_workers());

        tracing::info!(
            address = %addr,
            max_workers = pool.max_workers(),
            "Proxy server starting"
        );

        loop {
            let reaped = pool.reap();
            if reaped > 0 {
                tracing::trace!(
                    reaped,
                    outstanding = pool.len(),
                    active = pool.active(),
                    "Reclaimed workers"
                );
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        metrics::record_connection();
                        let conn = Connection::new(stream, peer, self.config.timeouts.header_read());
                        pool.spawn(serve_connection(conn, Arc::clone(&self.config)));
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        pool.drain(self.config.timeouts.shutdown_drain()).await;

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}
