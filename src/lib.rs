//! # linekv - A Small Networked TTL Cache
//!
//! linekv keeps ephemeral key/value pairs in memory, expires them after a
//! fixed time-to-live, and serves them to any number of TCP clients over a
//! newline-delimited text protocol.
//!
//! ## Features
//!
//! - **Line Protocol**: `<id> SET|GET|DEL <key> [value]`, one reply per line
//! - **Reader/Writer Locking**: concurrent GETs, exclusive SET/DEL/sweeps
//! - **Fixed TTL**: every SET gives the entry the same lifetime; GET never
//!   extends it
//! - **Background Sweeper**: expired entries are reclaimed without client
//!   traffic, and the sweeper can be stopped deterministically
//! - **Async I/O**: one Tokio task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                │
//! │                                                                    │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐             │
//! │  │   Server    │───>│ Connection  │───>│  Command    │             │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │             │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘             │
//! │                            │                  │                    │
//! │                            ▼                  ▼                    │
//! │                     ┌─────────────┐    ┌──────────────────────┐    │
//! │                     │    Line     │    │    StorageEngine     │    │
//! │                     │   Parser    │    │  RwLock<HashMap<..>> │    │
//! │                     └─────────────┘    └──────────▲───────────┘    │
//! │                                                   │                │
//! │                                        ┌──────────┴───────────┐    │
//! │                                        │    ExpirySweeper     │    │
//! │                                        │ (Background Task)    │    │
//! │                                        └──────────────────────┘    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::server::{Server, ServerConfig};
//! use linekv::storage::{ExpirySweeper, StorageEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let storage = Arc::new(StorageEngine::new(config.ttl));
//!     let sweeper = ExpirySweeper::start(Arc::clone(&storage));
//!
//!     let server = Server::bind(&config, storage).await?;
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!
//!     sweeper.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, request/response types
//! - [`storage`]: the TTL store and its expiry sweeper
//! - [`commands`]: maps requests to store operations
//! - [`connection`]: per-client read/dispatch/write loop
//! - [`server`]: accept loop and server configuration
//! - [`client`]: async client library

pub mod client;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

use std::time::Duration;

pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, ParseError, Response, Verb};
pub use server::{Server, ServerConfig, ServerError};
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port linekv listens on
pub const DEFAULT_PORT: u16 = 7070;

/// The default host linekv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default time-to-live for every entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
