//! Route table and hot-swappable router.
//!
//! # Responsibilities
//! - Store routes per method in registration order
//! - Resolve (method, path) to the first route whose pattern matches
//! - Report an explicit failure when nothing matches
//! - Swap the whole table atomically on reload
//!
//! # Design Decisions
//! - First registered match wins; overlapping patterns are allowed
//! - Two distinct failures: no routes for the method, or none of them match
//! - Readers take a snapshot, so a swap never affects a lookup in progress

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::PathPattern;

/// Final request handler.
pub type Handler = Arc<dyn Fn(Request, Response) + Send + Sync>;

/// Routing failures.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no routes registered for {0}")]
    NoRouteForMethod(Method),
    #[error("no {method} route matches `{path}`")]
    NoPatternMatch { method: Method, path: String },
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A (method, pattern, handler) triple.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Handler,
}

impl Route {
    /// Compile `pattern` into a route.
    pub fn new(method: Method, pattern: &str, handler: Handler) -> Result<Self, RouteError> {
        let pattern = PathPattern::new(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            method,
            pattern,
            handler,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Method → ordered routes.
#[derive(Clone, Default, Debug)]
pub struct RouteTable {
    routes: HashMap<Method, Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route for `method`. Fails only if `pattern` does not compile.
    pub fn register<F>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(Request, Response) + Send + Sync + 'static,
    {
        self.register_handler(method, pattern, Arc::new(handler))
    }

    /// Like [`register`](Self::register), for an already shared handler.
    pub fn register_handler(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        let route = Route::new(method, pattern, handler)?;
        Ok(self.push_route(route))
    }

    /// Append a compiled route.
    pub fn push_route(&mut self, route: Route) -> &mut Self {
        tracing::debug!(method = %route.method, pattern = %route.pattern, "Route registered");
        self.routes.entry(route.method).or_default().push(route);
        self
    }

    /// Resolve the handler of the first route for `method` whose pattern matches `path`.
    pub fn match_route(&self, method: Method, path: &str) -> Result<Handler, RouteError> {
        let routes = match self.routes.get(&method) {
            Some(routes) if !routes.is_empty() => routes,
            _ => return Err(RouteError::NoRouteForMethod(method)),
        };

        routes
            .iter()
            .find(|route| route.pattern.is_match(path))
            .map(|route| Arc::clone(&route.handler))
            .ok_or_else(|| RouteError::NoPatternMatch {
                method,
                path: path.to_string(),
            })
    }

    /// Routes registered for `method`, in registration order.
    pub fn routes(&self, method: Method) -> &[Route] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! method_registrars {
    ($($name:ident => $method:ident),* $(,)?) => {
        impl RouteTable {
            $(
                #[doc = concat!("Register a route for `", stringify!($method), "` requests.")]
                pub fn $name<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
                where
                    F: Fn(Request, Response) + Send + Sync + 'static,
                {
                    self.register(Method::$method, pattern, handler)
                }
            )*
        }
    };
}

method_registrars! {
    on_get => Get,
    on_head => Head,
    on_post => Post,
    on_put => Put,
    on_delete => Delete,
    on_options => Options,
    on_trace => Trace,
    on_connect => Connect,
    on_patch => Patch,
}

/// The live route table behind an atomic pointer.
pub struct Router {
    table: ArcSwap<RouteTable>,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Replace the whole table.
    pub fn install(&self, table: RouteTable) {
        let routes = table.len();
        self.table.store(Arc::new(table));
        tracing::info!(routes, "Route table installed");
    }

    /// The table as of now. Later installs do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Apply `edit` to a copy of the current table and install the result.
    ///
    /// `edit` may run more than once if another install races with it.
    pub fn update<F>(&self, mut edit: F)
    where
        F: FnMut(&mut RouteTable),
    {
        self.table.rcu(|current| {
            let mut table = RouteTable::clone(current);
            edit(&mut table);
            table
        });
    }

    pub fn match_route(&self, method: Method, path: &str) -> Result<Handler, RouteError> {
        self.table.load().match_route(method, path)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouteTable::new())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::Outbound;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn marker(trace: &Trace, name: &'static str) -> impl Fn(Request, Response) + Send + Sync {
        let trace = Arc::clone(trace);
        move |_req, _res| trace.lock().unwrap().push(name)
    }

    fn invoke(handler: Handler, method: Method, path: &str) {
        handler(
            Request::new(method, path),
            Response::new(Outbound::detached(), "Acorn/test"),
        );
    }

    #[test]
    fn first_registered_match_wins() {
        let trace = Trace::default();
        let mut table = RouteTable::new();
        table
            .on_get("/.*", marker(&trace, "catch-all"))
            .unwrap()
            .on_get("/about", marker(&trace, "about"))
            .unwrap();

        invoke(table.match_route(Method::Get, "/about").unwrap(), Method::Get, "/about");
        assert_eq!(*trace.lock().unwrap(), vec!["catch-all"]);
    }

    #[test]
    fn later_route_matches_when_earlier_does_not() {
        let trace = Trace::default();
        let mut table = RouteTable::new();
        table.on_get("/", marker(&trace, "index")).unwrap();
        table.on_get("/docs/.*", marker(&trace, "docs")).unwrap();

        invoke(table.match_route(Method::Get, "/docs/a").unwrap(), Method::Get, "/docs/a");
        invoke(table.match_route(Method::Get, "/").unwrap(), Method::Get, "/");
        assert_eq!(*trace.lock().unwrap(), vec!["docs", "index"]);
    }

    #[test]
    fn method_without_routes() {
        let mut table = RouteTable::new();
        table.on_get("/", |_, _| {}).unwrap();

        let err = table.match_route(Method::Post, "/").err().unwrap();
        assert!(matches!(err, RouteError::NoRouteForMethod(Method::Post)));
    }

    #[test]
    fn match_is_anchored() {
        let mut table = RouteTable::new();
        table.on_get("/", |_, _| {}).unwrap();

        let err = table.match_route(Method::Get, "/missing").err().unwrap();
        match err {
            RouteError::NoPatternMatch { method, path } => {
                assert_eq!(method, Method::Get);
                assert_eq!(path, "/missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let mut table = RouteTable::new();
        let err = table.on_post("/[", |_, _| {}).err().unwrap();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn routes_keep_registration_order() {
        let mut table = RouteTable::new();
        table.on_put("/b", |_, _| {}).unwrap();
        table.on_put("/a", |_, _| {}).unwrap();
        table.on_delete("/a", |_, _| {}).unwrap();

        let patterns: Vec<_> = table
            .routes(Method::Put)
            .iter()
            .map(|r| r.pattern().as_str())
            .collect();
        assert_eq!(patterns, vec!["/b", "/a"]);
        assert_eq!(table.len(), 3);
        assert!(table.routes(Method::Trace).is_empty());
    }

    #[test]
    fn installing_a_snapshot_keeps_results() {
        let trace = Trace::default();
        let mut table = RouteTable::new();
        table.on_get("/", marker(&trace, "index")).unwrap();
        table.on_get("/a.*", marker(&trace, "a")).unwrap();
        table.on_head("/", marker(&trace, "head")).unwrap();
        let router = Router::new(table);

        let probes = [
            (Method::Get, "/"),
            (Method::Get, "/abc"),
            (Method::Head, "/"),
            (Method::Get, "/zzz"),
            (Method::Post, "/"),
        ];
        let resolve = |router: &Router| {
            probes
                .iter()
                .map(|(m, p)| router.match_route(*m, p).ok().map(|h| Arc::as_ptr(&h) as *const ()))
                .collect::<Vec<_>>()
        };

        let before = resolve(&router);
        router.install(RouteTable::clone(&router.snapshot()));
        assert_eq!(resolve(&router), before);
    }

    #[test]
    fn install_replaces_the_table() {
        let mut table = RouteTable::new();
        table.on_get("/old", |_, _| {}).unwrap();
        let router = Router::new(table);

        let mut next = RouteTable::new();
        next.on_get("/new", |_, _| {}).unwrap();
        router.install(next);

        assert!(router.match_route(Method::Get, "/old").is_err());
        assert!(router.match_route(Method::Get, "/new").is_ok());
    }

    #[test]
    fn update_appends_to_current_table() {
        let router = Router::default();
        let route = Route::new(Method::Get, "/x", Arc::new(|_: Request, _: Response| {})).unwrap();
        router.update(|table| {
            table.push_route(route.clone());
        });
        assert_eq!(router.snapshot().len(), 1);
        assert!(router.match_route(Method::Get, "/x").is_ok());
    }
}
