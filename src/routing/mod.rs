//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, path)
//!     → router.rs (load current table snapshot)
//!     → routes for method, in registration order
//!     → matcher.rs (anchored pattern match)
//!     → Return: first matching Handler, or RouteError
//!
//! Table construction:
//!     on_get / on_post / ... (pattern, handler)
//!     → compile PathPattern
//!     → append to method's sequence
//!     → Router::install (atomic swap)
//! ```
//!
//! # Design Decisions
//! - First match wins; ordering alone resolves overlaps
//! - Full-string matching, no path parameters
//! - Tables are values; reload builds a new one and swaps it in

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{Handler, Route, RouteError, RouteTable, Router};
