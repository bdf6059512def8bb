//! Duplex relay engine.
//!
//! # Responsibilities
//! - Copy bytes client → upstream and upstream → client concurrently
//! - End the whole session when either direction finishes or fails, or
//!   when the session deadline elapses
//! - Let the other direction keep copying for a bounded grace period
//!   (never past the deadline), then stop it
//!
//! # Design Decisions
//! - One `CancellationToken` per session, cancelled when the deadline
//!   elapses or the grace period runs out, and observed by both directions
//! - Never returns an error: I/O failures and timeouts are recorded in
//!   the `RelayOutcome` and the caller decides what to log
//! - Owns both streams; they are closed when `relay` returns

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Why a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client stopped sending (EOF).
    ClientClosed,
    /// The upstream stopped sending (EOF).
    UpstreamClosed,
    /// A read or write failed in either direction.
    Failed,
    /// The session deadline elapsed with both directions still open.
    DeadlineElapsed,
}

impl RelayEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayEnd::ClientClosed => "client_closed",
            RelayEnd::UpstreamClosed => "upstream_closed",
            RelayEnd::Failed => "failed",
            RelayEnd::DeadlineElapsed => "deadline",
        }
    }
}

/// Summary of a finished relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub end: RelayEnd,
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

enum FirstEvent {
    Outbound(io::Result<()>),
    Inbound(io::Result<()>),
    Deadline,
}

/// Relay bytes between `client` and `upstream` until the session ends.
pub async fn relay<C, U>(client: C, upstream: U, deadline: Duration, grace: Duration) -> RelayOutcome
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let session_end = deadline_from_now(deadline);
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);

    let cancel = CancellationToken::new();
    let sent = AtomicU64::new(0);
    let received = AtomicU64::new(0);

    let outbound = pump(client_read, upstream_write, &sent, cancel.clone());
    let inbound = pump(upstream_read, client_write, &received, cancel.clone());
    tokio::pin!(outbound, inbound);

    let first = tokio::select! {
        result = &mut outbound => FirstEvent::Outbound(result),
        result = &mut inbound => FirstEvent::Inbound(result),
        _ = tokio::time::sleep_until(session_end) => FirstEvent::Deadline,
    };
    let grace_end = deadline_from_now(grace).min(session_end);

    let end = match first {
        FirstEvent::Outbound(result) => {
            finish(inbound.as_mut(), grace_end, &cancel, "upstream_to_client").await;
            classify(result, RelayEnd::ClientClosed, "client_to_upstream")
        }
        FirstEvent::Inbound(result) => {
            finish(outbound.as_mut(), grace_end, &cancel, "client_to_upstream").await;
            classify(result, RelayEnd::UpstreamClosed, "upstream_to_client")
        }
        FirstEvent::Deadline => {
            cancel.cancel();
            let _ = tokio::join!(&mut outbound, &mut inbound);
            RelayEnd::DeadlineElapsed
        }
    };

    RelayOutcome {
        end,
        client_to_upstream: sent.load(Ordering::Relaxed),
        upstream_to_client: received.load(Ordering::Relaxed),
    }
}

/// `now + duration`, saturating at roughly thirty years out.
fn deadline_from_now(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(30 * 365 * 24 * 60 * 60))
}

/// Let the direction still running copy until it ends or `grace_end`
/// passes, then stop it.
async fn finish<F>(
    mut direction: Pin<&mut F>,
    grace_end: Instant,
    cancel: &CancellationToken,
    name: &'static str,
) where
    F: Future<Output = io::Result<()>>,
{
    let result = match tokio::time::timeout_at(grace_end, direction.as_mut()).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            direction.await
        }
    };
    if let Err(error) = result {
        tracing::debug!(direction = name, error = %error, "Relay direction failed during grace");
    }
}

fn classify(result: io::Result<()>, on_eof: RelayEnd, direction: &'static str) -> RelayEnd {
    match result {
        Ok(()) => on_eof,
        Err(error) => {
            tracing::warn!(direction, error = %error, "Relay direction failed");
            RelayEnd::Failed
        }
    }
}

/// Copy one direction until EOF, error, or cancellation.
///
/// Cancellation is checked first at every await, so a cancelled pump
/// returns on its next poll.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    copied: &AtomicU64,
    cancel: CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            // Pass the half-close on so the peer sees EOF.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = writer.shutdown() => {}
            }
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            written = writer.write_all(&buf[..n]) => written?,
        }
        copied.fetch_add(n as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::duplex;

    const GRACE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn copies_both_directions_until_client_closes() {
        let (client_near, mut client_far) = duplex(1024);
        let (upstream_near, mut upstream_far) = duplex(1024);

        let session =
            tokio::spawn(relay(client_near, upstream_near, Duration::from_secs(5), GRACE));

        client_far.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream_far.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(client_far);
        let outcome = session.await.unwrap();
        assert_eq!(
            outcome,
            RelayOutcome { end: RelayEnd::ClientClosed, client_to_upstream: 4, upstream_to_client: 5 }
        );

        // The upstream side is closed once the session is over.
        let mut rest = Vec::new();
        upstream_far.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn upstream_eof_ends_session_and_flushes_to_client() {
        let (client_near, mut client_far) = duplex(1024);
        let (upstream_near, mut upstream_far) = duplex(1024);

        let session =
            tokio::spawn(relay(client_near, upstream_near, Duration::from_secs(5), GRACE));

        upstream_far.write_all(b"HTTP/1.1 200 OK\r\n\r\nhello").await.unwrap();
        drop(upstream_far);

        let mut response = Vec::new();
        client_far.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\nhello");

        let outcome = session.await.unwrap();
        assert_eq!(outcome.end, RelayEnd::UpstreamClosed);
        assert_eq!(outcome.upstream_to_client, 24);
    }

    #[tokio::test]
    async fn reply_within_grace_reaches_half_closed_client() {
        let (client_near, mut client_far) = duplex(1024);
        let (upstream_near, mut upstream_far) = duplex(1024);

        let session =
            tokio::spawn(relay(client_near, upstream_near, Duration::from_secs(5), GRACE));

        client_far.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        client_far.shutdown().await.unwrap();

        let mut request = Vec::new();
        upstream_far.read_to_end(&mut request).await.unwrap();
        assert_eq!(request, b"GET / HTTP/1.1\r\n\r\n");

        tokio::time::sleep(GRACE / 4).await;
        upstream_far.write_all(b"late reply").await.unwrap();
        drop(upstream_far);

        let mut response = Vec::new();
        client_far.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"late reply");

        let outcome = session.await.unwrap();
        assert_eq!(outcome.end, RelayEnd::ClientClosed);
        assert_eq!(outcome.upstream_to_client, 10);
    }

    #[tokio::test]
    async fn silent_upstream_is_dropped_after_grace() {
        let (client_near, client_far) = duplex(1024);
        let (upstream_near, _upstream_far) = duplex(1024);

        let started = Instant::now();
        let session =
            tokio::spawn(relay(client_near, upstream_near, Duration::from_secs(5), GRACE));
        drop(client_far);

        let outcome = session.await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(outcome.end, RelayEnd::ClientClosed);
        assert!(elapsed >= GRACE);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn grace_never_extends_past_deadline() {
        let (client_near, client_far) = duplex(1024);
        let (upstream_near, _upstream_far) = duplex(1024);

        let started = Instant::now();
        drop(client_far);
        let outcome =
            relay(client_near, upstream_near, Duration::from_millis(20), Duration::from_secs(10))
                .await;

        assert_eq!(outcome.end, RelayEnd::ClientClosed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn deadline_tears_down_idle_session() {
        let (client_near, _client_far) = duplex(1024);
        let (upstream_near, _upstream_far) = duplex(1024);

        let started = Instant::now();
        let outcome = relay(client_near, upstream_near, Duration::from_millis(50), GRACE).await;

        assert_eq!(outcome.end, RelayEnd::DeadlineElapsed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stalled_writer_does_not_outlive_grace() {
        // A tiny upstream buffer that nobody drains blocks the outbound write.
        let (client_near, mut client_far) = duplex(1024);
        let (upstream_near, _upstream_far) = duplex(8);

        let session =
            tokio::spawn(relay(client_near, upstream_near, Duration::from_millis(100), GRACE));
        client_far.write_all(&[7u8; 512]).await.unwrap();

        let started = Instant::now();
        let outcome = session.await.unwrap();
        assert_eq!(outcome.end, RelayEnd::DeadlineElapsed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
