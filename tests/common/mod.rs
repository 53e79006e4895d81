//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use acorn::http::Dispatcher;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;

/// Bind an in-memory stream to `dispatcher`; returns the client end and its slot.
pub fn connect(dispatcher: &Arc<Dispatcher>) -> (DuplexStream, usize) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let slot = dispatcher.accept(server, None);
    (client, slot)
}

/// Send `raw` and read until the server closes the stream.
pub async fn exchange(client: &mut DuplexStream, raw: &str) -> String {
    client.write_all(raw.as_bytes()).await.unwrap();
    read_all(client).await
}

pub async fn read_all(client: &mut DuplexStream) -> String {
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut received))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(received).unwrap()
}

/// Send `raw` over TCP and read until the server closes the socket.
pub async fn tcp_exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(received).unwrap()
}

/// Split a raw response into head (without the blank line) and body.
pub fn split_response(raw: &str) -> (&str, &str) {
    raw.split_once("\r\n\r\n").expect("response has no header terminator")
}

/// Poll `cond` until it holds, failing after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}
