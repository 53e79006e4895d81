//! Per-connection reader and writer tasks.
//!
//! # Data Flow
//! ```text
//! socket read half ──▶ read_loop ──▶ on_data(chunk) ... ──▶ Disconnect
//!                          ▲
//!                          │ closed signal (watch)
//!                          │
//! Outbound::{write, send_file, close} ──▶ mpsc ──▶ write_loop ──▶ socket write half
//! ```
//!
//! # Design Decisions
//! - Commands are applied strictly in queue order, so a close queued after a
//!   write runs only once that write has completed
//! - A write failure ends the writer and raises the closed signal; nothing is retried.
//!   This includes socket failures while streaming a file, but not file read errors
//! - File transfers report their outcome through a oneshot the caller may ignore

use std::fmt;
use std::io;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};

use crate::http::file::FileEntry;
use crate::net::connection::{ConnectionId, StateCell};

const FILE_CHUNK: usize = 16 * 1024;

/// Callback invoked once a queued write has completed (or failed).
pub type WriteCallback = Box<dyn FnOnce(io::Result<usize>) + Send>;

enum Outgoing {
    Write {
        bytes: Bytes,
        done: Option<WriteCallback>,
    },
    File {
        entry: FileEntry,
        done: oneshot::Sender<Result<u64, TransferError>>,
    },
    Close,
}

/// Why a file transfer did not complete.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("writing to the connection failed: {0}")]
    Write(#[source] io::Error),
    #[error("file ended after {actual} of {expected} bytes")]
    Truncated { expected: u64, actual: u64 },
    #[error("connection closed before the transfer finished")]
    ConnectionClosed,
}

/// Pending outcome of [`Outbound::send_file`].
///
/// Dropping it is fine: the writer logs the outcome either way.
#[derive(Debug)]
pub struct FileTransfer {
    rx: oneshot::Receiver<Result<u64, TransferError>>,
}

impl FileTransfer {
    /// Wait for the transfer to finish; yields the number of body bytes sent.
    pub async fn outcome(self) -> Result<u64, TransferError> {
        self.rx.await.unwrap_or(Err(TransferError::ConnectionClosed))
    }
}

/// Cloneable write side of a connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outgoing>,
    state: StateCell,
}

impl fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outgoing::Write { bytes, .. } => write!(f, "Write({} bytes)", bytes.len()),
            Outgoing::File { entry, .. } => write!(f, "File({})", entry.name()),
            Outgoing::Close => f.write_str("Close"),
        }
    }
}

impl Outbound {
    /// An outbound handle whose writer is already gone. Every command is dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self {
            id: ConnectionId::new(),
            tx,
            state: StateCell::default(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &StateCell {
        &self.state
    }

    /// True once the writer has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue `bytes` for writing. Returns false if the writer is gone.
    pub fn write(&self, bytes: impl Into<Bytes>) -> bool {
        self.push(Outgoing::Write {
            bytes: bytes.into(),
            done: None,
        })
    }

    /// Queue `bytes` and run `done` once they are written.
    ///
    /// If the writer is already gone, `done` runs immediately with `BrokenPipe`.
    pub fn write_then<F>(&self, bytes: impl Into<Bytes>, done: F) -> bool
    where
        F: FnOnce(io::Result<usize>) + Send + 'static,
    {
        let cmd = Outgoing::Write {
            bytes: bytes.into(),
            done: Some(Box::new(done)),
        };
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(mpsc::error::SendError(Outgoing::Write { done: Some(done), .. })) => {
                done(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection writer has shut down",
                )));
                false
            }
            Err(_) => false,
        }
    }

    /// Queue the body of `entry` to be streamed after everything queued so far.
    pub fn send_file(&self, entry: FileEntry) -> FileTransfer {
        let (done, rx) = oneshot::channel();
        self.push(Outgoing::File { entry, done });
        FileTransfer { rx }
    }

    /// Close the stream once every previously queued command has completed.
    pub fn close(&self) -> bool {
        self.push(Outgoing::Close)
    }

    fn push(&self, cmd: Outgoing) -> bool {
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(mpsc::error::SendError(cmd)) => {
                tracing::debug!(connection_id = %self.id, command = ?cmd, "Writer gone, command dropped");
                false
            }
        }
    }
}

/// Start the writer task for `writer`.
///
/// The returned receiver flips to `true` when the writer closes the stream
/// (active close or write failure).
pub(crate) fn spawn_writer<W>(
    writer: W,
    id: ConnectionId,
    state: StateCell,
) -> (Outbound, watch::Receiver<bool>)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);
    tokio::spawn(write_loop(writer, rx, closed_tx, id));
    (Outbound { id, tx, state }, closed_rx)
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    closed: watch::Sender<bool>,
    id: ConnectionId,
) where
    W: AsyncWrite + Unpin,
{
    let mut close = false;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Outgoing::Write { bytes, done } => {
                let result: io::Result<usize> = async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await?;
                    Ok(bytes.len())
                }
                .await;

                let failed = result.is_err();
                if let Err(e) = &result {
                    tracing::warn!(connection_id = %id, error = %e, "Write failed");
                }
                if let Some(done) = done {
                    done(result);
                }
                if failed {
                    close = true;
                    break;
                }
            }
            Outgoing::File { entry, done } => {
                let result = stream_file(&mut writer, &entry).await;
                match &result {
                    Ok(bytes) => tracing::info!(
                        connection_id = %id,
                        file = %entry.name(),
                        bytes,
                        "File transfer complete"
                    ),
                    Err(e) => tracing::warn!(
                        connection_id = %id,
                        file = %entry.name(),
                        error = %e,
                        "File transfer failed"
                    ),
                }
                let failed = matches!(result, Err(TransferError::Write(_)));
                let _ = done.send(result);
                if failed {
                    close = true;
                    break;
                }
            }
            Outgoing::Close => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!(connection_id = %id, error = %e, "Shutdown after close failed");
                }
                close = true;
                break;
            }
        }
    }

    rx.close();
    while let Ok(cmd) = rx.try_recv() {
        abandon(cmd);
    }
    if close {
        let _ = closed.send(true);
    }
    tracing::trace!(connection_id = %id, "Writer stopped");
}

/// Complete a command that will never run.
fn abandon(cmd: Outgoing) {
    match cmd {
        Outgoing::Write { done: Some(done), .. } => done(Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "connection closed before the write",
        ))),
        Outgoing::File { done, .. } => {
            let _ = done.send(Err(TransferError::ConnectionClosed));
        }
        Outgoing::Write { done: None, .. } | Outgoing::Close => {}
    }
}

async fn stream_file<W>(writer: &mut W, entry: &FileEntry) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(entry.path()).await?;
    let mut buf = vec![0u8; FILE_CHUNK];
    let mut sent = 0u64;

    while sent < entry.size() {
        let want = (entry.size() - sent).min(FILE_CHUNK as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(TransferError::Write)?;
        sent += n as u64;
    }
    writer.flush().await.map_err(TransferError::Write)?;

    if sent < entry.size() {
        return Err(TransferError::Truncated {
            expected: entry.size(),
            actual: sent,
        });
    }
    Ok(sent)
}

/// How a connection's reader came to an end.
#[derive(Debug)]
pub enum Disconnect {
    /// The peer closed its side.
    PeerClosed,
    /// Our writer closed the stream.
    ActiveClose,
    /// Reading failed.
    Error(io::Error),
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::PeerClosed => f.write_str("peer closed"),
            Disconnect::ActiveClose => f.write_str("active close"),
            Disconnect::Error(e) => write!(f, "read error: {}", e),
        }
    }
}

/// Read chunks of at most `buf_size` bytes and hand each to `on_data`, in order,
/// until the peer disconnects, reading fails, or `closed` flips to true.
pub(crate) async fn read_loop<R, F>(
    mut reader: R,
    buf_size: usize,
    mut closed: watch::Receiver<bool>,
    mut on_data: F,
) -> Disconnect
where
    R: AsyncRead + Unpin,
    F: FnMut(Bytes),
{
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut watching = true;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => return Disconnect::PeerClosed,
                Ok(n) => on_data(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => return Disconnect::Error(e),
            },
            changed = closed.changed(), if watching => match changed {
                Ok(()) if *closed.borrow() => return Disconnect::ActiveClose,
                Ok(()) => {}
                Err(_) if *closed.borrow() => return Disconnect::ActiveClose,
                Err(_) => watching = false,
            },
        }
    }
}
