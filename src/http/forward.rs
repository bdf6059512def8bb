//! Forwarding of plain HTTP requests.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::ParsedRequest;
use crate::http::response::FORWARD_BAD_GATEWAY;
use crate::http::rewrite::rewrite_request;
use crate::http::target::Target;
use crate::net::relay::{relay, RelayOutcome};
use crate::net::upstream;
use crate::observability::metrics;

const KIND: &str = "http";

/// Rewrite `request` for `target`, send it, and relay the exchange.
///
/// `body_prefix` holds body bytes already read along with the head. The
/// rest of any body, and the whole response, pass through the relay untouched.
pub async fn forward<S>(
    mut client: S,
    request: &ParsedRequest,
    target: Target,
    path_and_query: &str,
    body_prefix: Vec<u8>,
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
            let _ = client.write_all(FORWARD_BAD_GATEWAY).await;
            let _ = client.shutdown().await;
            return Err(ProxyError::UpstreamConnect { target, source });
        }
    };

    let head = rewrite_request(request, &target, path_and_query);
    upstream.write_all(head.as_bytes()).await?;
    if !body_prefix.is_empty() {
        upstream.write_all(&body_prefix).await?;
    }

    tracing::debug!(
        method = %request.method,
        upstream = %target,
        path = %path_and_query,
        "Request forwarded"
    );

    let outcome =
        relay(client, upstream, config.timeouts.http_relay(), config.timeouts.relay_grace()).await;
    metrics::record_relay(KIND, &outcome);
    Ok(outcome)
}
