//! Acorn: an event-driven HTTP request dispatcher.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ net::listener ──▶ http::dispatcher ──▶ net::pool    │
//!                           │                        │                              │
//!                           │        reader task ────┤ on_data(slot, id, chunk)     │
//!                           │                        ▼                              │
//!                           │               http::request::parse                   │
//!                           │                        │                              │
//!                           │                        ▼                              │
//!                           │            http::middleware (Next cursor)            │
//!                           │                        │                              │
//!                           │                        ▼                              │
//!                           │          routing::router (first match / 404)         │
//!                           │                        │                              │
//!                           │                        ▼                              │
//!     ◀─────────────────────┼── writer task ◀── http::response (send / send_file)  │
//!                           │                                                      │
//!                           │   config · lifecycle · observability · service       │
//!                           └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

// Application wiring
pub mod service;

pub use config::AcornConfig;
pub use http::{Dispatcher, HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
