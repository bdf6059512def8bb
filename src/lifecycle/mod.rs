//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Apply CLI overrides → Validate → Init logging/metrics → Bind
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain workers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: address resolution or bind failure aborts startup
//! - Shutdown has a deadline: workers still running after the drain window are aborted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
