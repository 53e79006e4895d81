//! Request logging step.

use std::time::Instant;

use crate::http::middleware::chain::{Middleware, Next};

/// Attribute key holding the [`Instant`] the request entered the chain.
pub const RECEIVED_AT: &str = "received_at";

/// Logs every request and stamps its arrival time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog;

impl Middleware for RequestLog {
    fn process(&self, mut next: Next) {
        let connection_id = next.response().outbound().connection_id();
        let request = next.request_mut();
        request.set_attribute(RECEIVED_AT, Instant::now());

        tracing::info!(
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path(),
            %connection_id,
            "Request received"
        );
        next.resume();
    }
}
