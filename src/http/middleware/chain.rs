//! Continuation-passing middleware chain.
//!
//! # Responsibilities
//! - Run steps strictly in registration order
//! - Let a step suspend and resume later from any task
//! - Fall through to the endpoint once every step has resumed
//!
//! # Design Decisions
//! - The continuation is a value ([`Next`]) owning the cursor and the
//!   request/response pair; `resume` consumes it, so it runs at most once
//! - A step ends the chain early with [`Next::halt`]
//! - Dropping a `Next` without resuming or halting stalls the request; this is
//!   logged, not recovered
//!
//! # Data Flow
//! ```text
//! run(req, res)
//!     → Next { position: 0 }.resume()
//!     → step[0].process(Next { position: 1 })
//!         ... step may await a timer, then ...
//!     → next.resume()
//!     → step[1].process(Next { position: 2 })
//!     → ...
//!     → endpoint.call(req, res)
//! ```

use std::fmt;
use std::sync::Arc;

use crate::http::request::{Request, RequestId};
use crate::http::response::Response;

/// One request-processing step.
///
/// A step receives the continuation and must eventually either
/// [`resume`](Next::resume) it or [`halt`](Next::halt) it.
pub trait Middleware: Send + Sync {
    fn process(&self, next: Next);
}

impl<F> Middleware for F
where
    F: Fn(Next) + Send + Sync,
{
    fn process(&self, next: Next) {
        self(next)
    }
}

/// Where control goes after the last step.
pub trait Endpoint: Send + Sync {
    fn call(&self, request: Request, response: Response);
}

impl<F> Endpoint for F
where
    F: Fn(Request, Response) + Send + Sync,
{
    fn call(&self, request: Request, response: Response) {
        self(request, response)
    }
}

/// Ordered list of middleware steps.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    steps: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Registration order is execution order.
    pub fn use_step<M>(&mut self, step: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append an already shared step.
    pub fn use_shared(&mut self, step: Arc<dyn Middleware>) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drive `request`/`response` through every step, then into `endpoint`.
    pub fn run(self: Arc<Self>, request: Request, response: Response, endpoint: Arc<dyn Endpoint>) {
        Next::start(self, endpoint, request, response).resume();
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// The continuation handed to each step.
pub struct Next {
    position: usize,
    chain: Arc<MiddlewareChain>,
    endpoint: Arc<dyn Endpoint>,
    request: Request,
    response: Response,
    guard: ChainGuard,
}

impl Next {
    fn start(
        chain: Arc<MiddlewareChain>,
        endpoint: Arc<dyn Endpoint>,
        request: Request,
        response: Response,
    ) -> Self {
        let guard = ChainGuard {
            request_id: request.id(),
            position: 0,
            armed: true,
        };
        Self {
            position: 0,
            chain,
            endpoint,
            request,
            response,
            guard,
        }
    }

    /// Number of steps entered so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Run the next step, or the endpoint if every step has run.
    pub fn resume(self) {
        let Next {
            position,
            chain,
            endpoint,
            request,
            response,
            mut guard,
        } = self;
        guard.armed = false;

        match chain.steps.get(position).cloned() {
            Some(step) => {
                tracing::trace!(request_id = %request.id(), step = position, "Entering middleware");
                let next = Next {
                    position: position + 1,
                    guard: ChainGuard {
                        request_id: request.id(),
                        position: position + 1,
                        armed: true,
                    },
                    chain,
                    endpoint,
                    request,
                    response,
                };
                step.process(next);
            }
            None => {
                tracing::trace!(request_id = %request.id(), "Middleware complete");
                endpoint.call(request, response);
            }
        }
    }

    /// Stop the chain and take back the pair, typically to answer early.
    pub fn halt(self) -> (Request, Response) {
        let Next {
            position,
            request,
            response,
            mut guard,
            ..
        } = self;
        guard.armed = false;
        tracing::debug!(request_id = %request.id(), step = position, "Middleware chain halted");
        (request, response)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("steps", &self.chain.len())
            .field("request_id", &self.request.id())
            .finish()
    }
}

/// Reports a continuation that was dropped without resuming or halting.
struct ChainGuard {
    request_id: RequestId,
    position: usize,
    armed: bool,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                request_id = %self.request_id,
                step = self.position,
                "Middleware dropped its continuation; request stalled"
            );
        }
    }
}
