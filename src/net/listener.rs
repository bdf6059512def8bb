//! TCP listener implementation.
//!
//! # Responsibilities
//! - Resolve the configured listen address (IP literal or hostname)
//! - Bind to it
//! - Accept incoming TCP connections one at a time
//!
//! Concurrency limits live in the worker pool, not here: the listener
//! never refuses or delays an accept.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen address did not resolve to an IPv4 address.
    #[error("Failed to resolve listen address {address:?}: {reason}")]
    Resolve { address: String, reason: String },

    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// Turn a listen address and port into a socket address.
///
/// IP literals are used as-is. Anything else is looked up and the first
/// IPv4 result wins; no IPv4 result is an error.
pub async fn resolve_listen_addr(address: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let address = address.trim();
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolve_error = |reason: String| ListenerError::Resolve { address: address.to_string(), reason };

    let mut addrs = tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| resolve_error(e.to_string()))?;

    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| resolve_error("no IPv4 address found".to_string()))
}

/// The proxy's listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Resolve and bind the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = resolve_listen_addr(&config.address, config.port).await?;

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let local_addr = inner.local_addr().map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
