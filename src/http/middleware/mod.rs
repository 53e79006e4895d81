//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → chain.rs (Next cursor over registered steps)
//!     → logging.rs (RequestLog: stamp + log)
//!     → cookies.rs (CookieParser: Cookie header → Cookies attribute)
//!     → delay.rs (Delay: resume from a timer)
//!     → Endpoint (route lookup)
//! ```

pub mod chain;
pub mod cookies;
pub mod delay;
pub mod logging;

pub use chain::{Endpoint, Middleware, MiddlewareChain, Next};
pub use cookies::{CookieParser, Cookies, COOKIES};
pub use delay::Delay;
pub use logging::{RequestLog, RECEIVED_AT};
