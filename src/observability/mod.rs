//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!       (connection_id, slot, request_id, method, path, status)
//!     → logging.rs (EnvFilter + fmt layer, pretty or JSON)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection and request IDs flow through every dispatch log line
//! - Pool occupancy is logged periodically by the server loop

pub mod logging;

pub use logging::{init_logging, LogFormat};
