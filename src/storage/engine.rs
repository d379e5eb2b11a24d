//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the in-memory store behind linekv: a single
//! `HashMap` guarded by a reader/writer lock, where every entry carries an
//! absolute expiration instant computed from one fixed TTL.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock**: `get` takes the shared lock, `set`/`delete`/sweeps take
//!    the exclusive lock. Any number of readers may run together.
//! 2. **Read-only expiry check**: `get` reports an expired entry as missing
//!    but never removes it, so reads never need the write lock.
//! 3. **Active cleanup**: expired entries are physically removed by the
//!    background sweeper (see [`crate::storage::expiry`]) or overwritten by
//!    the next `set` of the same key.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │               StorageEngine               │
//! │   ttl: Duration                           │
//! │   ┌───────────────────────────────────┐   │
//! │   │ RwLock<HashMap<String, Entry>>    │   │
//! │   └───────────────────────────────────┘   │
//! └───────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Expiry used when `now + ttl` overflows `Instant` (roughly 30 years).
pub const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A stored value together with the instant it stops being visible.
///
/// Entries are never modified in place; a `set` replaces the whole entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored value
    pub value: String,
    /// When this entry expires
    pub expires_at: Instant,
}

impl Entry {
    /// Creates an entry that expires `ttl` from now.
    ///
    /// A TTL too large to add to the clock is clamped to [`FAR_FUTURE`].
    pub fn with_ttl(value: String, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);

        Self { value, expires_at }
    }

    /// Checks whether this entry had expired at `now`.
    ///
    /// An entry is still visible at exactly its expiration instant.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Checks whether this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Counters describing the work the engine has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Entries currently in the map, expired or not
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// GETs that found a live value
    pub get_hits: u64,
    /// GETs that found nothing or an expired value
    pub get_misses: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Entries removed by sweeps
    pub expired: u64,
}

/// The key-value store shared by every connection.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` and hand clones to the server and the sweeper.
/// All methods take `&self`.
///
/// # Example
///
/// ```
/// use linekv::storage::StorageEngine;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new(Duration::from_secs(60));
///
/// engine.set("name", "Ariz");
/// assert_eq!(engine.get("name"), Some("Ariz".to_string()));
///
/// engine.delete("name");
/// assert_eq!(engine.get("name"), None);
/// ```
pub struct StorageEngine {
    /// The entries, expired ones included until swept
    data: RwLock<HashMap<String, Entry>>,

    /// Lifetime given to every entry at `set`
    ttl: Duration,

    get_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("ttl", &self.ttl)
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TTL)
    }
}

impl StorageEngine {
    /// Creates an empty engine whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            ttl,
            get_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// The TTL applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A writer that panics mid-operation can only have dropped a whole
    // insert or remove, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `key`, replacing any previous entry and
    /// restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = Entry::with_ttl(value.into(), self.ttl);
        self.write().insert(key.into(), entry);
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key is absent or its entry has expired. Only the
    /// read lock is taken; an expired entry is left for the sweeper.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let value = {
            let data = self.read();
            data.get(key)
                .filter(|entry| !entry.is_expired_at(now))
                .map(|entry| entry.value.clone())
        };

        let counter = if value.is_some() {
            &self.hit_count
        } else {
            &self.miss_count
        };
        counter.fetch_add(1, Ordering::Relaxed);

        value
    }

    /// Removes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if an entry (live or expired) was removed. Deleting a
    /// missing key is not an error.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.write().remove(key).is_some()
    }

    /// Removes every entry that has expired as of now.
    ///
    /// Takes the write lock once for the whole pass. This is called by the
    /// background expiry sweeper.
    ///
    /// # Returns
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> u64 {
        let removed = {
            let mut data = self.write();
            let now = Instant::now();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired_at(now));
            (before - data.len()) as u64
        };

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }

        removed
    }

    /// Number of entries in the map, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the map holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every key in the map, including expired ones not yet
    /// swept.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            get_hits: self.hit_count.load(Ordering::Relaxed),
            get_misses: self.miss_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}
