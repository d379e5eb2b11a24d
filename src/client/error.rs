//! Error types for the linekv client.

use crate::protocol::ParseError;
use thiserror::Error;

/// Errors that can occur when using the client.
///
/// A `NOT FOUND` or `UNKNOWN COMMAND` reply is not an error here; it comes
/// back as a [`Response`](crate::protocol::Response) with an error status.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect, read or write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection before answering
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The server answered with a line the client cannot decode
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// A key or value that cannot be expressed in the line protocol
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    /// Returns `true` if the connection can no longer be used.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::ConnectionClosed)
    }
}
