//! Storage Engine Module
//!
//! The in-memory store and its background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             StorageEngine               │
//! │   RwLock<HashMap<String, Entry>>        │
//! │   (readers share, writers exclusive)    │
//! └─────────────────────────────────────────┘
//!                     ▲
//!                     │ cleanup_expired() every TTL
//!       ┌─────────────┴─────────────┐
//!       │       ExpirySweeper       │
//!       │  (Background Tokio Task)  │
//!       └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use linekv::storage::StorageEngine;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new(Duration::from_secs(3600));
//!
//! engine.set("session", "token123");
//! assert_eq!(engine.get("session"), Some("token123".to_string()));
//! ```

pub mod engine;
pub mod expiry;

pub use engine::{Entry, StorageEngine, StorageStats, FAR_FUTURE};
pub use expiry::{ExpiryConfig, ExpirySweeper, MIN_SWEEP_INTERVAL};
