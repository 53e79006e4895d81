//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → pool.rs (bind to a free or new slot)
//!     → transport.rs (reader task → on_data, writer task ← Outbound)
//!     → connection.rs (lifecycle tracking, state machine)
//!
//! Connection States:
//!     Accepted → Reading → Dispatching → Responding → Closed
//! ```
//!
//! # Design Decisions
//! - Slots are reused before the pool grows
//! - Disconnect always flows through the reader task, so a slot is released once
//! - Writes and closes are queued, never issued concurrently

pub mod connection;
pub mod listener;
pub mod pool;
pub mod transport;

pub use connection::{Connection, ConnectionId, ConnectionState, StateCell};
pub use listener::{Listener, ListenerError};
pub use pool::{ConnectionPool, PoolStats};
pub use transport::{Disconnect, FileTransfer, Outbound, TransferError};
