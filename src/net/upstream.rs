//! Upstream connection establishment.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::http::target::Target;

/// Open a TCP connection to `target`, giving up after `timeout`.
///
/// Name resolution counts against the same timeout. No retries.
pub async fn connect(target: &Target, timeout: Duration) -> io::Result<TcpStream> {
    let attempt = TcpStream::connect((target.host.as_str(), target.port));
    let stream = tokio::time::timeout(timeout, attempt).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {target} timed out after {}ms", timeout.as_millis()),
        )
    })??;

    let _ = stream.set_nodelay(true);
    Ok(stream)
}
