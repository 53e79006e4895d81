//! Cookie parsing step.
//!
//! Parses every `Cookie` header into a [`Cookies`] attribute so later steps and
//! handlers can read cookies by name.

use crate::http::middleware::chain::{Middleware, Next};
use crate::http::request::Request;

/// Attribute key under which [`CookieParser`] stores [`Cookies`].
pub const COOKIES: &str = "cookies";

/// Cookies sent with a request, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    /// Parse a `Cookie` header value (`a=1; b=2`).
    ///
    /// Pairs without a name are skipped; a bare name gets an empty value.
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from_header(header);
        cookies
    }

    fn extend_from_header(&mut self, header: &str) {
        for pair in header.split(';') {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            self.pairs.push((name.to_string(), value.to_string()));
        }
    }

    /// All cookies found in the request's `Cookie` headers.
    pub fn from_request(request: &Request) -> Self {
        let mut cookies = Self::default();
        for header in request.headers().get_all("cookie") {
            cookies.extend_from_header(header);
        }
        cookies
    }

    /// Value of the first cookie called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Stores the request's cookies under [`COOKIES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieParser;

impl Middleware for CookieParser {
    fn process(&self, mut next: Next) {
        let cookies = Cookies::from_request(next.request());
        tracing::trace!(request_id = %next.request().id(), count = cookies.len(), "Cookies parsed");
        next.request_mut().set_attribute(COOKIES, cookies);
        next.resume();
    }
}
