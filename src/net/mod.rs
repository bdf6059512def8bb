//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (resolve, bind, accept)
//!     → connection.rs (connection id, peer, read timeout)
//!     → pool.rs (bounded worker, one per connection)
//!     → Hand off to HTTP layer
//!
//! Once the HTTP layer has picked a target:
//!     → upstream.rs (connect with timeout)
//!     → relay.rs (duplex byte relay until EOF, error or deadline)
//! ```

pub mod connection;
pub mod listener;
pub mod pool;
pub mod relay;
pub mod upstream;

pub use connection::{Connection, ConnectionId};
pub use listener::{Listener, ListenerError};
pub use pool::WorkerPool;
pub use relay::{relay, RelayEnd, RelayOutcome};
