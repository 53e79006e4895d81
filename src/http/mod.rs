//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, reload, shutdown)
//!     → dispatcher.rs (slot binding, one pair per data event)
//!     → request.rs (parse request line, headers, body; request ID)
//!     → middleware/ (ordered steps, may suspend)
//!     → routing layer (first matching handler, or 404)
//!     → response.rs (serialize, write, optional active close)
//!     → file.rs (streamed file bodies)
//! ```

pub mod dispatcher;
pub mod file;
pub mod headers;
pub mod method;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchSettings, Dispatcher};
pub use file::{mime_for_extension, FileEntry};
pub use headers::Headers;
pub use method::{Method, UnknownMethod};
pub use request::{Attributes, ParseError, Request, RequestId};
pub use response::Response;
pub use server::HttpServer;
