//! Connection Handler Module
//!
//! This module handles individual client connections to linekv.
//! Each client gets its own handler task that runs in a loop,
//! reading lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (no handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Reading: bytes from socket  │◄──┐
//!    └──────────────┬───────────────┘   │
//!                   ▼                   │
//!    ┌──────────────────────────────┐   │
//!    │  Dispatching: one response   │   │
//!    │  per complete line, in order │───┘
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / I/O error / idle timeout
//!        │
//!        ▼
//! 5. Closed: handler task ends
//! ```
//!
//! There is no close command. Bytes of an unterminated line still buffered
//! at EOF are discarded.
//!
//! A line longer than the parser's limit is answered with a bare `ERROR`;
//! its remaining bytes are skipped up to the next `\n` and the connection
//! keeps serving.

use crate::commands::CommandHandler;
use crate::protocol::{LineParser, ParseError, Response};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so tests can drive it with in-memory I/O.
pub struct ConnectionHandler<S> {
    /// The client stream, writes buffered until each response is flushed
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet consumed as complete lines
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: LineParser,

    /// Skipping the tail of an oversized line until its `\n` arrives
    discarding: bool,

    /// Close the connection after this long without a complete read
    idle_timeout: Option<Duration>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client transport
    /// * `addr` - The client's socket address
    /// * `command_handler` - Executes decoded commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: LineParser::new(),
            discarding: false,
            idle_timeout: None,
            stats,
        }
    }

    /// Closes the connection if the client sends nothing for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Replaces the line parser, e.g. to change the maximum line length.
    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = parser;
        self
    }

    /// Runs the main connection loop.
    ///
    /// Reads lines from the client, executes them, and sends back
    /// responses until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = match self.main_loop().await {
            Err(ConnectionError::ClientDisconnected) => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) if e.is_disconnect() => {
                debug!(client = %self.addr, error = %e, "Client disconnected")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.try_take_line() {
                let response = match line {
                    Ok(line) => self.command_handler.handle_line(&line),
                    Err(_) => Response::malformed(),
                };
                self.stats.command_processed();
                self.send_response(&response.serialize()).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Removes the next complete line from the buffer, if there is one.
    ///
    /// An oversized line yields `Some(Err(_))` once and is then skipped.
    fn try_take_line(&mut self) -> Option<Result<BytesMut, ParseError>> {
        if self.discarding {
            match self.parser.line_end(&self.buffer) {
                Some(pos) => {
                    self.buffer.advance(pos + 1);
                    self.discarding = false;
                }
                None => {
                    self.buffer.clear();
                    return None;
                }
            }
        }

        let consumed = match self.parser.next_line(&self.buffer) {
            Ok(Some((_, consumed))) => consumed,
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete line, need more data"
                );
                return None;
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Line rejected");
                match self.parser.line_end(&self.buffer) {
                    Some(pos) => self.buffer.advance(pos + 1),
                    None => {
                        self.buffer.clear();
                        self.discarding = true;
                    }
                }
                return Some(Err(e));
            }
        };

        let mut line = self.buffer.split_to(consumed);
        line.truncate(consumed - 1);
        trace!(
            client = %self.addr,
            consumed = consumed,
            remaining = self.buffer.len(),
            "Framed line"
        );
        Some(Ok(line))
    }

    /// Reads more data from the client into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = match self.idle_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(timeout))??,
            None => read.await?,
        };

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            let discarded = self.buffer.len();
            self.buffer.clear();
            return Err(ConnectionError::UnexpectedEof { discarded });
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends one serialized response to the client.
    async fn send_response(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected between lines
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client disconnected in the middle of a line
    #[error("Unexpected end of stream ({discarded} bytes of partial line discarded)")]
    UnexpectedEof { discarded: usize },

    /// No data for longer than the idle timeout
    #[error("Idle for more than {0:?}")]
    IdleTimeout(Duration),
}

impl ConnectionError {
    /// True for the ordinary ways a peer goes away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected | ConnectionError::UnexpectedEof { .. } => true,
            ConnectionError::IoError(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Handles a client connection.
///
/// Creates a `ConnectionHandler` and runs it to completion. Errors end
/// only this connection; [`ConnectionHandler::run`] has already logged them.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    idle_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats)
        .with_idle_timeout(idle_timeout);
    let _ = handler.run().await;
}
