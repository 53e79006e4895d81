//! Request construction from raw bytes.
//!
//! # Responsibilities
//! - Parse one request head (request line + headers) from a single data event
//! - Split the request target into path and decoded query pairs
//! - Assign a unique request ID for log correlation
//! - Carry an attribute bag that middleware fills and handlers read
//!
//! # Design Decisions
//! - One data event yields one request; nothing is buffered across events
//! - The body is whatever follows the head, bounded by `Content-Length`
//! - Attributes are keyed by string and type-checked at lookup time

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::http::headers::Headers;
use crate::http::method::{Method, UnknownMethod};

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random (v4) request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a data event could not be turned into a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("request head is not terminated by an empty line")]
    IncompleteHead,
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("malformed request line `{0}`")]
    InvalidRequestLine(String),
    #[error(transparent)]
    UnknownMethod(#[from] UnknownMethod),
    #[error("malformed header line `{0}`")]
    InvalidHeader(String),
}

/// String-keyed, runtime-typed values attached to a request.
#[derive(Default)]
pub struct Attributes {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Attributes {
    /// Store `value` under `key`, returning true if a previous value was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.values.insert(key.into(), Box::new(value)).is_some()
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove and return the value under `key`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Attributes").field("keys", &keys).finish()
    }
}

/// A parsed HTTP request.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    method: Method,
    target: String,
    path: String,
    query: Vec<(String, String)>,
    version: String,
    headers: Headers,
    body: Bytes,
    attributes: Attributes,
}

impl Request {
    /// Build a request with no headers and an empty body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let (path, query) = split_target(&target);
        Self {
            id: RequestId::new(),
            method,
            path,
            query,
            target,
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
            attributes: Attributes::default(),
        }
    }

    /// Parse a request from the bytes of one data event.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let head_end = find_head_end(raw).ok_or(ParseError::IncompleteHead)?;
        let head = std::str::from_utf8(&raw[..head_end]).map_err(|_| ParseError::InvalidEncoding)?;
        let mut lines = head.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v), None) if v.starts_with("HTTP/") => (m, t, v),
            _ => return Err(ParseError::InvalidRequestLine(request_line.to_string())),
        };

        let mut request = Request::new(method.parse()?, target);
        request.version = version.to_string();

        for line in lines.take_while(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .filter(|(name, _)| !name.is_empty() && !name.contains(char::is_whitespace))
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            request.headers.append(name, value.trim());
        }

        let rest = &raw[head_end + 4..];
        let body_len = request
            .headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map_or(rest.len(), |declared| declared.min(rest.len()));
        request.body = Bytes::copy_from_slice(&rest[..body_len]);

        Ok(request)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The raw request target, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The path component used for routing.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query pairs, in the order they appeared.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of the query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Shorthand for `attributes_mut().insert(..)`.
    pub fn set_attribute<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.attributes.insert(key, value)
    }

    /// Shorthand for `attributes().get(..)`.
    pub fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn take_attribute<T: Any>(&mut self, key: &str) -> Option<T> {
        self.attributes.remove(key)
    }
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let without_fragment = target.split_once('#').map_or(target, |(t, _)| t);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (without_fragment.to_string(), Vec::new()),
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
