//! Per-connection request handling.
//!
//! # Responsibilities
//! - Read and parse the request head within the connection's read timeout
//! - Resolve the upstream target and answer 400 when it cannot be found
//! - Route to the CONNECT tunnel or the HTTP forwarder
//! - Log the outcome at a level that matches its class

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{Instrument, Level};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{read_request_head, ParsedRequest};
use crate::http::response::BAD_REQUEST;
use crate::http::target::{resolve, Route};
use crate::http::{connect, forward};
use crate::net::connection::Connection;
use crate::net::relay::{RelayEnd, RelayOutcome};
use crate::observability::metrics;

/// Serve one accepted connection to completion. Never fails; the
/// connection is closed when this returns.
pub async fn serve_connection(conn: Connection, config: Arc<ProxyConfig>) {
    let span = tracing::info_span!("connection", id = %conn.id, peer = %conn.peer);
    async move {
        match handle_stream(conn.stream, conn.read_timeout, &config).await {
            Ok(Some(outcome)) => log_outcome(&outcome),
            Ok(None) => tracing::debug!("Client closed before sending a request"),
            Err(error) => log_failure(&error),
        }
    }
    .instrument(span)
    .await
}

/// Handle a single request on `stream`.
///
/// Returns `Ok(None)` when the client went away before completing a
/// request head, and the relay summary otherwise.
pub async fn handle_stream<S>(
    mut stream: S,
    read_timeout: Duration,
    config: &ProxyConfig,
) -> Result<Option<RelayOutcome>, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head_read = read_request_head(&mut stream, config.limits.max_header_bytes);
    let head = match tokio::time::timeout(read_timeout, head_read).await {
        Ok(Ok(Some(head))) => head,
        Ok(Ok(None)) => return Ok(None),
        Ok(Err(error)) => return Err(error),
        Err(_) => {
            return Err(ProxyError::ClientProtocol(format!(
                "no complete request head within {}s",
                read_timeout.as_secs_f64()
            )))
        }
    };

    let request = ParsedRequest::parse(&head.block)?;
    tracing::debug!(method = %request.method, target = %request.target, "Request received");

    let route = match resolve(&request) {
        Ok(route) => route,
        Err(error) => {
            if error.is_bad_request() {
                metrics::record_bad_request();
                let _ = stream.write_all(BAD_REQUEST).await;
                let _ = stream.shutdown().await;
            }
            return Err(error);
        }
    };

    let outcome = match route {
        Route::Tunnel(target) => connect::tunnel(stream, target, head.remainder, config).await?,
        Route::Forward { target, path_and_query } => {
            forward::forward(stream, &request, target, &path_and_query, head.remainder, config)
                .await?
        }
    };
    Ok(Some(outcome))
}

fn log_outcome(outcome: &RelayOutcome) {
    if outcome_level(outcome) == Level::WARN {
        tracing::warn!(
            end = outcome.end.as_str(),
            client_to_upstream = outcome.client_to_upstream,
            upstream_to_client = outcome.upstream_to_client,
            "Relay failed"
        );
    } else {
        tracing::debug!(
            end = outcome.end.as_str(),
            client_to_upstream = outcome.client_to_upstream,
            upstream_to_client = outcome.upstream_to_client,
            "Relay finished"
        );
    }
}

fn outcome_level(outcome: &RelayOutcome) -> Level {
    match outcome.end {
        RelayEnd::Failed => Level::WARN,
        RelayEnd::ClientClosed | RelayEnd::UpstreamClosed | RelayEnd::DeadlineElapsed => {
            Level::DEBUG
        }
    }
}

fn log_failure(error: &ProxyError) {
    let message = match error {
        ProxyError::ClientProtocol(_)
        | ProxyError::HeaderTooLarge { .. }
        | ProxyError::InvalidPort(_) => "Connection closed without response",
        ProxyError::UriParse { .. } | ProxyError::MissingHost => "Rejected request with 400",
        ProxyError::UpstreamConnect { .. } => "Upstream unreachable, answered 502",
        ProxyError::Io(_) => "Connection failed",
    };
    if failure_level(error) == Level::WARN {
        tracing::warn!(error = %error, "{message}");
    } else {
        tracing::debug!(error = %error, "{message}");
    }
}

fn failure_level(error: &ProxyError) -> Level {
    match error {
        ProxyError::ClientProtocol(_)
        | ProxyError::HeaderTooLarge { .. }
        | ProxyError::InvalidPort(_) => Level::DEBUG,
        ProxyError::UriParse { .. }
        | ProxyError::MissingHost
        | ProxyError::UpstreamConnect { .. }
        | ProxyError::Io(_) => Level::WARN,
    }
}
