//! The static-content service.
//!
//! # Responsibilities
//! - Build the route table from configuration: the index route and every mount
//! - Build the middleware chain: request logging, cookie parsing, optional delay
//! - Serve files with `send_file`, answering `404` with an active close when a
//!   file is missing or a path leaves the static root
//!
//! # Data Flow
//! ```text
//! GET /            → static_files.root / static_files.index
//! GET <mount>      → static_files.root / mount.file
//! GET <mount>      → static_files.root / <request path>   (no file set)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::config::validation::is_contained;
use crate::config::AcornConfig;
use crate::http::file::FileEntry;
use crate::http::middleware::{CookieParser, Delay, MiddlewareChain, RequestLog};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::router::{RouteError, RouteTable};

/// Route table for `config`.
pub fn routes(config: &AcornConfig) -> Result<RouteTable, RouteError> {
    let root: Arc<Path> = Arc::from(config.static_files.root.as_path());
    let mut table = RouteTable::new();

    let index = root.join(&config.static_files.index);
    table.on_get("/", move |req, res| serve_file(index.clone(), req, res))?;

    for mount in &config.mounts {
        match &mount.file {
            Some(file) => {
                let path = root.join(file);
                table.on_get(&mount.pattern, move |req, res| {
                    serve_file(path.clone(), req, res)
                })?;
            }
            None => {
                let root = Arc::clone(&root);
                table.on_get(&mount.pattern, move |req, res| {
                    let resolved = resolve_under(&root, req.path());
                    match resolved {
                        Some(path) => serve_file(path, req, res),
                        None => not_found(&req, res),
                    }
                })?;
            }
        }
    }

    tracing::debug!(routes = table.len(), root = %root.display(), "Service routes built");
    Ok(table)
}

/// Middleware chain for `config`.
pub fn middleware(config: &AcornConfig) -> MiddlewareChain {
    let mut chain = MiddlewareChain::new();
    chain.use_step(RequestLog).use_step(CookieParser);
    if config.server.middleware_delay_ms > 0 {
        chain.use_step(Delay::new(Duration::from_millis(
            config.server.middleware_delay_ms,
        )));
    }
    chain
}

/// Map `request_path` to a file below `root`.
///
/// The path is percent-decoded first. Returns `None` for an empty path or one
/// that would leave `root`.
pub fn resolve_under(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative.as_os_str().is_empty() || !is_contained(relative) {
        return None;
    }
    Some(root.join(relative))
}

/// Stream the file at `path`, then close; `404` if it cannot be opened.
fn serve_file(path: PathBuf, request: Request, response: Response) {
    tokio::spawn(async move {
        match FileEntry::open(&path).await {
            Ok(entry) => {
                let outbound = response.outbound().clone();
                let transfer = response.send_file(&entry);
                outbound.close();
                if let Err(e) = transfer.outcome().await {
                    tracing::debug!(request_id = %request.id(), error = %e, "File response incomplete");
                }
            }
            Err(e) => {
                tracing::info!(
                    request_id = %request.id(),
                    path = %path.display(),
                    error = %e,
                    "File not available"
                );
                not_found(&request, response);
            }
        }
    });
}

fn not_found(request: &Request, mut response: Response) {
    tracing::debug!(request_id = %request.id(), path = %request.path(), "Responding with 404");
    response.set_status(StatusCode::NOT_FOUND);
    response.send(true);
}
