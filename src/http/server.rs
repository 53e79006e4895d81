//! HTTP server accept loop.
//!
//! # Responsibilities
//! - Accept connections and hand them to the dispatcher
//! - Install route tables arriving from config reloads
//! - Log pool occupancy periodically
//! - Stop accepting on shutdown, close every connection, drain the pool
//!
//! # Design Decisions
//! - Accept errors are logged and the loop keeps going
//! - The drain has a deadline; connections left after it are abandoned

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::net::listener::{Listener, ListenerError};
use crate::routing::router::RouteTable;

const DRAIN_POLL: Duration = Duration::from_millis(100);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept loop around a [`Dispatcher`].
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then close and drain every connection.
    pub async fn run(
        self,
        listener: Listener,
        mut table_updates: mpsc::UnboundedReceiver<RouteTable>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, server_name = %self.config.name, "HTTP server starting");

        let mut status = status_interval(self.config.status_interval_secs);
        let mut updates_open = true;

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.dispatcher.accept(stream, Some(peer));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                update = table_updates.recv(), if updates_open => match update {
                    Some(table) => self.dispatcher.install(table),
                    None => updates_open = false,
                },
                _ = tick(&mut status) => {
                    let stats = self.dispatcher.pool_stats();
                    tracing::info!(
                        slots = stats.slots,
                        active = stats.active,
                        free = stats.free,
                        peak = stats.peak,
                        "Connection pool status"
                    );
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        self.drain().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn drain(&self) {
        let closing = self.dispatcher.close_all();
        tracing::info!(closing, "Closing open connections");

        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_grace_secs);
        loop {
            let remaining = self.dispatcher.active_connections();
            if remaining == 0 {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(remaining, "Shutdown grace period elapsed with connections open");
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}

fn status_interval(secs: u64) -> Option<Interval> {
    (secs > 0).then(|| {
        let period = Duration::from_secs(secs);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
