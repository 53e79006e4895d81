//! Response building and sending.
//!
//! # Responsibilities
//! - Accumulate status, headers and body for one request
//! - Serialize once and hand the bytes to the connection's writer
//! - Chain an active close behind the write when asked to
//! - Stream files after an optimistic header block
//!
//! # Design Decisions
//! - Every response starts with `Server` and `Connection: close`; connections are
//!   never kept alive across responses
//! - Send operations consume the response, so it can only be sent once
//! - A file transfer never revises headers that were already written

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

use crate::http::file::FileEntry;
use crate::http::headers::Headers;
use crate::net::connection::ConnectionState;
use crate::net::transport::{FileTransfer, Outbound};

pub const SERVER: &str = "Server";
pub const CONNECTION: &str = "Connection";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";

/// A response bound to the output stream of the connection it answers.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: BytesMut,
    outbound: Outbound,
}

impl Response {
    /// A `200 OK` response carrying the default headers.
    pub fn new(outbound: Outbound, server_name: &str) -> Self {
        let mut headers = Headers::new();
        headers.append(SERVER, server_name);
        headers.append(CONNECTION, "close");
        Self {
            status: StatusCode::OK,
            headers,
            body: BytesMut::new(),
            outbound,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Set `name` to `value`, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Append a header line without replacing existing ones.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append to the buffered body.
    pub fn write_body(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(chunk.as_ref());
        self
    }

    /// Replace the buffered body.
    pub fn set_body(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        self.body.clear();
        self.write_body(body)
    }

    /// The outbound handle of the connection this response answers.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Serialize status line, headers and buffered body.
    ///
    /// `Content-Length` is derived from the body unless it was set explicitly.
    pub fn to_bytes(&self) -> Bytes {
        let reason = self.status.canonical_reason().unwrap_or("");
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        for (name, value) in self.headers.iter() {
            put_header(&mut out, name, value);
        }
        if !self.headers.contains(CONTENT_LENGTH) {
            put_header(&mut out, CONTENT_LENGTH, &self.body.len().to_string());
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }

    /// Set the status and send an otherwise unchanged response.
    pub fn send_status(mut self, status: StatusCode) {
        self.status = status;
        self.send(false);
    }

    /// Write the response. With `close_after`, the stream is closed once the
    /// write has completed; otherwise closing is left to the peer.
    pub fn send(self, close_after: bool) {
        let bytes = self.to_bytes();
        tracing::debug!(
            connection_id = %self.outbound.connection_id(),
            status = self.status.as_u16(),
            bytes = bytes.len(),
            close_after,
            "Sending response"
        );
        self.outbound.write(bytes);
        if close_after {
            self.outbound.close();
        }
        self.end();
    }

    /// Write headers describing `file`, then stream its contents.
    ///
    /// The returned transfer reports the outcome; it may be dropped.
    pub fn send_file(mut self, file: &FileEntry) -> FileTransfer {
        self.headers.set(CONTENT_LENGTH, file.size().to_string());
        self.headers.set(CONTENT_TYPE, file.mime());
        self.body.clear();

        tracing::debug!(
            connection_id = %self.outbound.connection_id(),
            file = %file.name(),
            size = file.size(),
            "Sending file"
        );
        self.outbound.write(self.to_bytes());
        let transfer = self.outbound.send_file(file.clone());
        self.end();
        transfer
    }

    fn end(&self) {
        self.outbound.state().set(ConnectionState::Responding);
        tracing::trace!(connection_id = %self.outbound.connection_id(), "Response ended");
    }
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}
