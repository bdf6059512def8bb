//! Accepted client connections.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Bundle an accepted socket with its peer address and read timeout
//!
//! A `Connection` is moved into exactly one worker and dropped (closed)
//! when that worker finishes, whichever way it exits.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An accepted client socket, owned by the worker serving it.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Bound on how long the request header block may take to arrive.
    pub read_timeout: Duration,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, read_timeout: Duration) -> Self {
        let _ = stream.set_nodelay(true);
        Self { id: ConnectionId::new(), stream, peer, read_timeout }
    }
}
