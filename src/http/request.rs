//! Request head accumulation and parsing.
//!
//! # Responsibilities
//! - Read a client stream until the CRLFCRLF terminator
//! - Bound the header block by a byte limit
//! - Split the block into a request line and ordered header lines
//!
//! # Design Decisions
//! - The stream is read in chunks, so bytes past the terminator may already
//!   be buffered. They are handed back as `RequestHead::remainder` for the
//!   handler to forward upstream.
//! - A stream that closes before the terminator is "no request", not an error.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProxyError;

const TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;

/// The raw header block of a request, plus anything read past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Header block text, without the terminating blank line.
    pub block: String,
    /// Bytes that followed the terminator in the same reads.
    pub remainder: Vec<u8>,
}

/// Read a request head from `reader`.
///
/// Returns `Ok(None)` when the stream ends before the terminator appears.
pub async fn read_request_head<R>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<RequestHead>, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut scanned: usize = 0;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        // Resume a few bytes back so a terminator split across reads is found.
        let from = scanned.saturating_sub(TERMINATOR.len() - 1);
        if let Some(pos) = find_terminator(&buf[from..]) {
            let end = from + pos;
            if end + TERMINATOR.len() > max_bytes {
                return Err(ProxyError::HeaderTooLarge { limit: max_bytes });
            }
            let remainder = buf.split_off(end + TERMINATOR.len());
            buf.truncate(end);
            return Ok(Some(RequestHead {
                block: String::from_utf8_lossy(&buf).into_owned(),
                remainder,
            }));
        }

        if buf.len() >= max_bytes {
            return Err(ProxyError::HeaderTooLarge { limit: max_bytes });
        }
        scanned = buf.len();
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}

/// A request line and its header lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    /// Header lines in arrival order, unparsed.
    pub header_lines: Vec<String>,
}

impl ParsedRequest {
    /// Split a header block into request line and headers.
    ///
    /// The request line must have exactly three space-separated fields.
    pub fn parse(block: &str) -> Result<Self, ProxyError> {
        let mut lines = block.split("\r\n");
        let request_line = lines.next().unwrap_or_default();

        let fields: Vec<&str> = request_line.split(' ').collect();
        let [method, target, version] = fields.as_slice() else {
            return Err(ProxyError::ClientProtocol(format!(
                "malformed request line {request_line:?}"
            )));
        };

        let header_lines = lines
            .take_while(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            header_lines,
        })
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }
}
