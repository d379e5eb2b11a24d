//! # linekv Client
//!
//! An async client holding a single connection to a linekv server.
//!
//! ```rust,no_run
//! use linekv::client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), linekv::client::ClientError> {
//!     let mut client = Client::connect("127.0.0.1:7070").await?;
//!
//!     client.set("greeting", "Hello, World!").await?;
//!
//!     let response = client.get("greeting").await?;
//!     if let Some(value) = response.as_value() {
//!         println!("Got: {}", value);
//!     }
//!
//!     client.delete("greeting").await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request ids
//!
//! Every request carries an id counted up from 1 on this connection. The
//! server echoes it, but the client does not compare it: responses are
//! paired with requests purely by order. All request methods take
//! `&mut self`, so only one request can be outstanding at a time.

mod error;

pub use error::ClientError;

use crate::protocol::{parse_response, Command, Response, Verb};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

/// A connection to a linekv server.
#[derive(Debug)]
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    next_id: u64,
}

impl Client {
    /// Connects to the server at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        debug!(server = %peer, "Connected");

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            next_id: 1,
        })
    }

    /// The server's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The id the next request will carry.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Stores `value` under `key`.
    ///
    /// The server trims leading and trailing whitespace from the value.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<Response, ClientError> {
        validate_value(value)?;
        self.request(Verb::Set, key, Some(value)).await
    }

    /// Fetches `key`. A missing or expired key yields an `ERROR NOT FOUND`
    /// response, see [`Response::is_not_found`].
    pub async fn get(&mut self, key: &str) -> Result<Response, ClientError> {
        self.request(Verb::Get, key, None).await
    }

    /// Removes `key`. Succeeds whether or not the key existed.
    pub async fn delete(&mut self, key: &str) -> Result<Response, ClientError> {
        self.request(Verb::Del, key, None).await
    }

    /// Shuts down the connection.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        debug!(server = %self.peer, "Connection closed");
        Ok(())
    }

    /// Writes one request line and reads exactly one response line.
    async fn request(
        &mut self,
        verb: Verb,
        key: &str,
        value: Option<&str>,
    ) -> Result<Response, ClientError> {
        validate_key(key)?;

        let id = self.next_id;
        self.next_id += 1;

        let command = Command {
            id: id.to_string(),
            verb,
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        self.writer.write_all(&command.serialize()).await?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 || !line.ends_with('\n') {
            return Err(ClientError::ConnectionClosed);
        }

        trace!(id = id, response = line.trim_end(), "Received response");
        Ok(parse_response(line.as_bytes())?)
    }
}

fn validate_key(key: &str) -> Result<(), ClientError> {
    if key.is_empty() {
        return Err(ClientError::InvalidArgument("key is empty".to_string()));
    }
    if key.contains(char::is_whitespace) {
        return Err(ClientError::InvalidArgument(format!(
            "key {:?} contains whitespace",
            key
        )));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), ClientError> {
    if value.contains(['\n', '\r']) {
        return Err(ClientError::InvalidArgument(
            "value contains a line break".to_string(),
        ));
    }
    Ok(())
}
