//! Command Handler Module
//!
//! Receives request lines, executes them against the storage engine and
//! returns the response to send back.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! Supported commands: `SET key value`, `GET key`, `DEL key`.

pub mod handler;

pub use handler::CommandHandler;
