//! HTTP proxy protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (from net)
//!     → server.rs (accept loop, dispatch to worker pool)
//!     → handler.rs (per-connection flow)
//!     → request.rs (read head until CRLFCRLF, split request line + headers)
//!     → target.rs (CONNECT authority | absolute URI | Host header)
//!     → connect.rs  (CONNECT: 200 Connection Established, opaque relay)
//!       forward.rs  (other methods: rewrite.rs, send head, relay)
//!     → response.rs (the few responses the proxy writes itself)
//! ```

pub mod connect;
pub mod forward;
pub mod handler;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod server;
pub mod target;

pub use request::{ParsedRequest, RequestHead};
pub use server::ProxyServer;
pub use target::{Route, Target};
