//! Forward HTTP/HTTPS proxy library.
//!
//! Accepts client connections, reads one HTTP/1.1 request head, and either
//! opens an opaque tunnel (`CONNECT`) or rewrites and forwards the request
//! to the origin, relaying raw bytes both ways afterwards.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
