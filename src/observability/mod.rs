//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Workers and the accept loop produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```

pub mod logging;
pub mod metrics;
