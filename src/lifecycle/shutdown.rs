//! Shutdown coordination for the proxy.
//!
//! The accept loop is the only long-lived subscriber. Workers never watch
//! the signal; they are drained by the pool once accepting has stopped.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Cloning shares the same channel, so the signal task and the code that
/// starts the server can each hold one.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal. Hand the receiver to
    /// `ProxyServer::run` before triggering.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `false` when nobody is listening any more, e.g. the accept
    /// loop has already exited.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_one_signal() {
        let shutdown = Shutdown::new();
        let mut receiver = shutdown.subscribe();

        assert!(shutdown.clone().trigger());
        assert!(receiver.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_listeners_reports_it() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.trigger());
    }
}
