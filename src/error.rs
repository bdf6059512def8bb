//! Per-connection error taxonomy.
//!
//! Every variant ends the connection that produced it and nothing else.
//! Which variants are answered, and with what, is decided by the handlers:
//!
//! | Variant | Client sees |
//! |---|---|
//! | `ClientProtocol`, `HeaderTooLarge`, `InvalidPort` | nothing, connection closed |
//! | `UriParse`, `MissingHost` | `400 Bad Request` |
//! | `UpstreamConnect` | `502 Bad Gateway` |
//! | `Io` | whatever was already sent |

use std::io;

use thiserror::Error;

use crate::http::target::Target;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or malformed request line, or the client went away before
    /// the header block was complete.
    #[error("client protocol error: {0}")]
    ClientProtocol(String),

    #[error("request header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("invalid absolute URI {uri:?}: {reason}")]
    UriParse { uri: String, reason: String },

    #[error("origin-form request without a Host header")]
    MissingHost,

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("failed to connect to {target}: {source}")]
    UpstreamConnect {
        target: Target,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Errors answered with `400 Bad Request`.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, ProxyError::UriParse { .. } | ProxyError::MissingHost)
    }
}
