//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use forward_proxy::config::ProxyConfig;
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::ProxyServer;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Upper bound for any single test exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    /// Trigger shutdown and wait for the accept loop to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(EXCHANGE_TIMEOUT, self.handle).await;
    }
}

/// Config tuned for tests: loopback, ephemeral port, short deadlines.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.address = "127.0.0.1".into();
    config.listener.port = 0;
    config.timeouts.connect_tunnel_secs = 5;
    config.timeouts.http_relay_secs = 5;
    config.timeouts.header_read_secs = 2;
    config.timeouts.upstream_connect_secs = 2;
    config.timeouts.shutdown_drain_secs = 1;
    config.pool.max_workers = Some(16);
    config
}

/// Start the proxy with `config` and return once it is accepting.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = ProxyServer::new(config);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestProxy { addr, shutdown, handle }
}

/// Start a mock origin that captures each request head and answers with
/// a fixed body before closing.
pub async fn start_recording_origin(
    body: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    start_slow_origin(body, Duration::ZERO).await
}

/// Like [`start_recording_origin`], but waits `delay` after reading the
/// head before answering.
pub async fn start_slow_origin(
    body: &'static str,
    delay: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = tx.send(head);
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Start a TCP server that echoes every byte back until the peer closes.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Read until the peer closes, bounded by [`EXCHANGE_TIMEOUT`].
pub async fn read_to_close<R: AsyncRead + Unpin>(reader: &mut R) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(EXCHANGE_TIMEOUT, reader.read_to_end(&mut buf))
        .await
        .expect("peer did not close in time")
        .unwrap();
    buf
}

/// Read exactly `len` bytes, bounded by [`EXCHANGE_TIMEOUT`].
pub async fn read_exact_bytes<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(EXCHANGE_TIMEOUT, reader.read_exact(&mut buf))
        .await
        .expect("peer did not answer in time")
        .unwrap();
    buf
}

async fn read_head<R: AsyncRead + Unpin>(reader: &mut R) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match reader.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
