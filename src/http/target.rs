//! Upstream target resolution.
//!
//! A request names its upstream in one of three ways:
//! - `CONNECT host[:port]`, port defaulting to 443
//! - an absolute-form `http://host[:port]/path?query` target, port defaulting to 80
//! - an origin-form path plus a `Host: host[:port]` header, port defaulting to 80

use std::fmt;

use url::Url;

use crate::error::ProxyError;
use crate::http::request::ParsedRequest;

pub const DEFAULT_TUNNEL_PORT: u16 = 443;
pub const DEFAULT_HTTP_PORT: u16 = 80;

const ABSOLUTE_HTTP_PREFIX: &str = "http://";
const HOST_HEADER: &str = "host:";

/// An upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Hostname or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Host in the form it takes inside an authority (IPv6 re-bracketed).
    pub fn authority_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    /// Value for a synthesized `Host` header; the port is omitted when it is 80.
    pub fn host_header_value(&self) -> String {
        if self.port == DEFAULT_HTTP_PORT {
            self.authority_host()
        } else {
            format!("{}:{}", self.authority_host(), self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority_host(), self.port)
    }
}

/// How a request is to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Opaque tunnel to the target.
    Tunnel(Target),
    /// Rewrite and forward, using `path_and_query` in the new request line.
    Forward { target: Target, path_and_query: String },
}

/// Derive the upstream of a parsed request.
pub fn resolve(request: &ParsedRequest) -> Result<Route, ProxyError> {
    if request.is_connect() {
        let target = split_authority(&request.target, DEFAULT_TUNNEL_PORT)?;
        return Ok(Route::Tunnel(target));
    }

    if starts_with_ignore_case(&request.target, ABSOLUTE_HTTP_PREFIX) {
        return resolve_absolute(&request.target);
    }

    let host = request
        .header_lines
        .iter()
        .find(|line| starts_with_ignore_case(line, HOST_HEADER))
        .map(|line| line[HOST_HEADER.len()..].trim())
        .filter(|value| !value.is_empty())
        .ok_or(ProxyError::MissingHost)?;

    Ok(Route::Forward {
        target: split_authority(host, DEFAULT_HTTP_PORT)?,
        path_and_query: request.target.clone(),
    })
}

fn resolve_absolute(uri: &str) -> Result<Route, ProxyError> {
    let uri_error = |reason: String| ProxyError::UriParse { uri: uri.to_string(), reason };

    let url = Url::parse(uri).map_err(|e| uri_error(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| uri_error("missing host".to_string()))?
        .trim_matches(|c| c == '[' || c == ']')
        .to_string();
    let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);

    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    Ok(Route::Forward { target: Target::new(host, port), path_and_query })
}

/// Split `host[:port]` on the first colon, or `[v6]:port` after the bracket.
/// An absent or empty port takes `default_port`.
fn split_authority(authority: &str, default_port: u16) -> Result<Target, ProxyError> {
    let authority = authority.trim();

    let (host, port) = match authority.strip_prefix('[') {
        Some(rest) => match rest.split_once(']') {
            Some((host, tail)) => (host, tail.strip_prefix(':')),
            None => (rest, None),
        },
        None => match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        },
    };

    let port = match port.map(str::trim) {
        None | Some("") => default_port,
        Some(raw) => raw.parse::<u16>().map_err(|_| ProxyError::InvalidPort(raw.to_string()))?,
    };

    Ok(Target::new(host, port))
}

/// ASCII case-insensitive prefix test.
pub(crate) fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
