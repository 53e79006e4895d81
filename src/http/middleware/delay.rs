//! Timer-deferred continuation.

use std::time::Duration;

use crate::http::middleware::chain::{Middleware, Next};

/// Resumes the chain only after `duration` has elapsed on a tokio timer.
///
/// Must run inside a tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    duration: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Middleware for Delay {
    fn process(&self, next: Next) {
        let duration = self.duration;
        tracing::trace!(request_id = %next.request().id(), ?duration, "Deferring middleware chain");
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            next.resume();
        });
    }
}
