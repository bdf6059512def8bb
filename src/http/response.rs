//! Responses the proxy writes itself.
//!
//! These are the only status lines the proxy ever synthesizes; everything
//! else a client sees comes from the upstream, byte for byte.

/// Answer to a CONNECT whose upstream could not be reached.
pub const TUNNEL_BAD_GATEWAY: &[u8] =
    b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Answer to a forwarded request whose upstream could not be reached.
pub const FORWARD_BAD_GATEWAY: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nFailed to connect to target server";

/// Answer to a request whose upstream cannot be determined.
pub const BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Acknowledgement of an established tunnel.
pub fn connection_established(proxy_agent: &str) -> String {
    format!("HTTP/1.1 200 Connection Established\r\nProxy-Agent: {proxy_agent}\r\n\r\n")
}
