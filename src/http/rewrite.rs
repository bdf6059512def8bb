//! Outbound request rewriting for forwarded (non-CONNECT) requests.
//!
//! - Hop-by-hop headers are dropped
//! - A `Host` header is synthesized when the client sent none
//! - `Connection: close` is always appended last
//! - The request line carries only path and query
//!
//! Bodies are never touched here; whatever follows the head is relayed raw.

use crate::http::request::ParsedRequest;
use crate::http::target::{starts_with_ignore_case, Target};

/// Header prefixes that are never forwarded upstream.
pub const HOP_BY_HOP_PREFIXES: [&str; 4] =
    ["proxy-connection:", "connection:", "keep-alive:", "proxy-authorization:"];

const HOST_PREFIX: &str = "host:";
const FORCED_CLOSE: &str = "Connection: close";

/// Build the outbound header lines from the client's.
pub fn outbound_headers(header_lines: &[String], target: &Target) -> Vec<String> {
    let mut headers: Vec<String> = header_lines
        .iter()
        .filter(|line| !is_hop_by_hop(line))
        .cloned()
        .collect();

    if !headers.iter().any(|line| starts_with_ignore_case(line, HOST_PREFIX)) {
        headers.push(format!("Host: {}", target.host_header_value()));
    }
    headers.push(FORCED_CLOSE.to_string());
    headers
}

/// Serialize the rewritten request head, blank line included.
pub fn rewrite_request(request: &ParsedRequest, target: &Target, path_and_query: &str) -> String {
    let mut head = format!("{} {} {}\r\n", request.method, path_and_query, request.version);
    for line in outbound_headers(&request.header_lines, target) {
        head.push_str(&line);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head
}

fn is_hop_by_hop(line: &str) -> bool {
    HOP_BY_HOP_PREFIXES.iter().any(|prefix| starts_with_ignore_case(line, prefix))
}
