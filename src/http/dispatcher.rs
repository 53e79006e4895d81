//! Connection manager and request dispatcher.
//!
//! # Responsibilities
//! - Bind accepted streams to pool slots and start their reader/writer tasks
//! - Turn each data event into a Request/Response pair
//! - Drive the pair through the middleware chain, then the route table
//! - Convert routing failures into `404` with an active close
//! - Release slots on disconnect
//!
//! # Data Flow
//! ```text
//! accept(stream)
//!     → pool.bind(slot) + spawn writer + spawn reader
//! reader: chunk
//!     → on_data(slot, id, chunk)
//!     → Request::parse            (400 + close on failure)
//!     → MiddlewareChain::run
//!     → process_route             (404 + close on RouteError)
//!     → handler(request, response)
//! reader: EOF / error / active close
//!     → on_disconnect(slot, id) → pool.release
//! ```
//!
//! # Design Decisions
//! - The pool lock is never held while middleware or handlers run
//! - Events carry the connection id; an event for a slot that now belongs to
//!   another connection is ignored
//! - No pipelining: each data event starts an independent pair

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::http::method::Method;
use crate::http::middleware::chain::{Endpoint, Middleware, MiddlewareChain};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::net::connection::{Connection, ConnectionId, ConnectionState, StateCell};
use crate::net::pool::{ConnectionPool, PoolStats};
use crate::net::transport::{read_loop, spawn_writer, Disconnect};
use crate::routing::router::{Route, RouteError, RouteTable, Router};

/// Server identity sent in the `Server` header unless configured otherwise.
pub const DEFAULT_SERVER_NAME: &str = "IncludeOS/Acorn";

/// Largest chunk handed to a single data event unless configured otherwise.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1460;

/// Per-dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub server_name: Arc<str>,
    pub read_buffer_size: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            server_name: Arc::from(DEFAULT_SERVER_NAME),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Owns the connection pool, the route table and the middleware chain.
pub struct Dispatcher {
    router: Router,
    middleware: ArcSwap<MiddlewareChain>,
    pool: Mutex<ConnectionPool>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self {
            router: Router::default(),
            middleware: ArcSwap::from_pointee(MiddlewareChain::new()),
            pool: Mutex::new(ConnectionPool::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Register a route on the live table.
    pub fn on<F>(&self, method: Method, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(Request, Response) + Send + Sync + 'static,
    {
        let route = Route::new(method, pattern, Arc::new(handler))?;
        self.router.update(|table| {
            table.push_route(route.clone());
        });
        Ok(())
    }

    /// Append a step to the live middleware chain.
    pub fn use_middleware<M>(&self, step: M)
    where
        M: Middleware + 'static,
    {
        let step: Arc<dyn Middleware> = Arc::new(step);
        self.middleware.rcu(|chain| {
            let mut chain = MiddlewareChain::clone(chain);
            chain.use_shared(Arc::clone(&step));
            chain
        });
    }

    /// Replace the whole route table.
    pub fn install(&self, table: RouteTable) {
        self.router.install(table);
    }

    /// Replace the whole middleware chain.
    pub fn install_middleware(&self, chain: MiddlewareChain) {
        let steps = chain.len();
        self.middleware.store(Arc::new(chain));
        tracing::info!(steps, "Middleware chain installed");
    }

    /// Bind `stream` to a slot and start serving it. Returns the slot.
    pub fn accept<S>(self: &Arc<Self>, stream: S, peer: Option<SocketAddr>) -> usize
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let id = ConnectionId::new();
        let state = StateCell::default();
        let (outbound, closed) = spawn_writer(writer, id, state.clone());

        let slot = self
            .pool()
            .bind(|slot| Connection::new(slot, outbound, peer));
        tracing::info!(connection_id = %id, slot, peer_addr = ?peer, "Connection bound");
        state.set(ConnectionState::Reading);

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let buf_size = dispatcher.settings.read_buffer_size;
            let reason = read_loop(reader, buf_size, closed, |chunk| {
                dispatcher.on_data(slot, id, chunk)
            })
            .await;
            dispatcher.on_disconnect(slot, id, reason);
        });

        slot
    }

    fn on_data(self: &Arc<Self>, slot: usize, id: ConnectionId, chunk: Bytes) {
        let outbound = {
            let mut pool = self.pool();
            match pool.get_mut(slot).filter(|conn| conn.id() == id) {
                Some(conn) => conn.begin_dispatch(),
                None => {
                    tracing::debug!(connection_id = %id, slot, "Data for released connection ignored");
                    return;
                }
            }
        };

        let mut response = Response::new(outbound, &self.settings.server_name);
        match Request::parse(&chunk) {
            Ok(request) => self.process(request, response),
            Err(e) => {
                tracing::warn!(connection_id = %id, slot, error = %e, "Unparsable request");
                response.set_status(StatusCode::BAD_REQUEST);
                response.send(true);
            }
        }
    }

    /// Run `request`/`response` through the middleware chain and the route table.
    pub fn process(self: &Arc<Self>, request: Request, response: Response) {
        let chain = self.middleware.load_full();
        let endpoint: Arc<dyn Endpoint> = Arc::clone(self) as Arc<dyn Endpoint>;
        chain.run(request, response, endpoint);
    }

    /// Resolve the route for `request` and hand the pair to its handler.
    pub fn process_route(&self, request: Request, mut response: Response) {
        match self.router.match_route(request.method(), request.path()) {
            Ok(handler) => handler(request, response),
            Err(e) => {
                tracing::info!(
                    request_id = %request.id(),
                    method = %request.method(),
                    path = %request.path(),
                    error = %e,
                    "Routing failed, responding with 404"
                );
                response.set_status(StatusCode::NOT_FOUND);
                response.send(true);
            }
        }
    }

    fn on_disconnect(&self, slot: usize, id: ConnectionId, reason: Disconnect) {
        let released = self.pool().release_if(slot, |conn| conn.id() == id);
        match released {
            Some(conn) => {
                conn.mark_closed();
                tracing::info!(
                    connection_id = %id,
                    slot,
                    reason = %reason,
                    requests = conn.requests(),
                    duration_ms = conn.accepted_at().elapsed().as_millis() as u64,
                    "Connection closed"
                );
            }
            None => {
                tracing::debug!(connection_id = %id, slot, "Disconnect for released slot ignored");
            }
        }
    }

    /// Actively close the connection in `slot` once its queued writes are done.
    ///
    /// Returns false if the slot is empty. The slot is released through the
    /// regular disconnect path.
    pub fn close(&self, slot: usize) -> bool {
        let pool = self.pool();
        match pool.get(slot) {
            Some(conn) => {
                tracing::debug!(connection_id = %conn.id(), slot, "Closing connection");
                conn.outbound().close()
            }
            None => false,
        }
    }

    /// Actively close every connection. Returns how many were asked to close.
    pub fn close_all(&self) -> usize {
        let pool = self.pool();
        pool.iter()
            .filter(|(_, conn)| conn.outbound().close())
            .count()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool().stats()
    }

    pub fn active_connections(&self) -> usize {
        self.pool().active()
    }

    fn pool(&self) -> MutexGuard<'_, ConnectionPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Endpoint for Dispatcher {
    fn call(&self, request: Request, response: Response) {
        self.process_route(request, response);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchSettings::default())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("middleware", &self.middleware.load().len())
            .field("pool", &self.pool_stats())
            .field("settings", &self.settings)
            .finish()
    }
}
