//! Connection state machine and per-connection bookkeeping.
//!
//! # Responsibilities
//! - Track connection state (Accepted → Reading → Dispatching → Responding → Closed)
//! - Generate unique connection IDs for tracing
//! - Hold the outbound handle responses are written through
//!
//! # Design Decisions
//! - The pool is the only owner of a `Connection`; everything else holds an
//!   [`Outbound`] handle or a slot index
//! - State lives in a shared atomic cell so responses can update it without the pool

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::net::transport::Outbound;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Bound to a slot, handlers not yet running.
    Accepted = 0,
    /// Waiting for bytes.
    Reading = 1,
    /// A request is travelling through middleware and routing.
    Dispatching = 2,
    /// A response has been handed to the writer.
    Responding = 3,
    /// Disconnected; the slot has been released.
    Closed = 4,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            0 => ConnectionState::Accepted,
            1 => ConnectionState::Reading,
            2 => ConnectionState::Dispatching,
            3 => ConnectionState::Responding,
            _ => ConnectionState::Closed,
        }
    }
}

/// Shared, lock-free holder of a connection's [`ConnectionState`].
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.0.load(Ordering::Relaxed))
    }

    /// Move to `state` unless the connection is already closed.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.0.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
            (cur != ConnectionState::Closed as u8).then_some(state as u8)
        });
    }

    pub fn close(&self) {
        self.0.store(ConnectionState::Closed as u8, Ordering::Relaxed);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::Accepted)
    }
}

/// An accepted transport connection bound to a pool slot.
#[derive(Debug)]
pub struct Connection {
    slot: usize,
    id: ConnectionId,
    peer: Option<SocketAddr>,
    outbound: Outbound,
    state: StateCell,
    accepted_at: Instant,
    requests: u64,
}

impl Connection {
    pub fn new(slot: usize, outbound: Outbound, peer: Option<SocketAddr>) -> Self {
        Self {
            slot,
            id: outbound.connection_id(),
            peer,
            state: outbound.state().clone(),
            outbound,
            accepted_at: Instant::now(),
            requests: 0,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Move to `Closed`; later transitions are ignored.
    pub fn mark_closed(&self) {
        self.state.close();
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// Number of data events dispatched on this connection.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Record a new data event and return the outbound handle for its response.
    pub(crate) fn begin_dispatch(&mut self) -> Outbound {
        self.requests += 1;
        self.state.set(ConnectionState::Dispatching);
        self.outbound.clone()
    }
}
