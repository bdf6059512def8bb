//! CONNECT tunnelling.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::response::{connection_established, TUNNEL_BAD_GATEWAY};
use crate::http::target::Target;
use crate::net::relay::{relay, RelayOutcome};
use crate::net::upstream;
use crate::observability::metrics;

const KIND: &str = "connect";

/// Open an opaque tunnel between `client` and `target`.
///
/// `early_data` is whatever the client sent after its CONNECT head before
/// the tunnel existed; it is delivered upstream ahead of the relay.
pub async fn tunnel<S>(
    mut client: S,
    target: Target,
    early_data: Vec<u8>,
    config: &ProxyConfig,
) -> Result<RelayOutcome, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    metrics::record_request(KIND);

    let mut upstream = match upstream::connect(&target, config.timeouts.upstream_connect()).await {
        Ok(stream) => stream,
        Err(source) => {
            metrics::record_upstream_failure(KIND);
            let _ = client.write_all(TUNNEL_BAD_GATEWAY).await;
            let _ = client.shutdown().await;
            return Err(ProxyError::UpstreamConnect { target, source });
        }
    };

    client.write_all(connection_established(&config.listener.proxy_agent).as_bytes()).await?;
    if !early_data.is_empty() {
        upstream.write_all(&early_data).await?;
    }

    tracing::debug!(upstream = %target, "Tunnel established");

    let outcome =
        relay(client, upstream, config.timeouts.connect_tunnel(), config.timeouts.relay_grace())
            .await;
    metrics::record_relay(KIND, &outcome);
    Ok(outcome)
}
