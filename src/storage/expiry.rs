//! Background Expiry Sweeper
//!
//! `get` never removes anything, so an entry that expires and is never
//! written again would stay in memory forever. The sweeper is a Tokio task
//! that wakes on a fixed interval (by default the engine's TTL) and removes
//! every expired entry in a single pass under the write lock.
//!
//! With interval `T` equal to the TTL, an entry is gone from the map at most
//! `2T` (plus sweep latency) after it was written.
//!
//! ## Shutdown
//!
//! The task listens on a `watch` channel. [`ExpirySweeper::stop`] or dropping
//! the handle signals it; the task exits at its next wake-up at the latest,
//! and usually immediately.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Shortest time the sweeper waits between passes, whatever the TTL.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl ExpiryConfig {
    /// Sweeps once per TTL.
    pub fn for_ttl(ttl: Duration) -> Self {
        Self { interval: ttl }
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self::for_ttl(crate::DEFAULT_TTL)
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts a sweeper that runs once per `engine.ttl()`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use linekv::storage::{ExpirySweeper, StorageEngine};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let engine = Arc::new(StorageEngine::new(Duration::from_secs(30)));
    /// let sweeper = ExpirySweeper::start(Arc::clone(&engine));
    ///
    /// // ... serve traffic ...
    ///
    /// sweeper.shutdown().await;
    /// ```
    pub fn start(engine: Arc<StorageEngine>) -> Self {
        let config = ExpiryConfig::for_ttl(engine.ttl());
        Self::start_with_config(engine, config)
    }

    /// Starts a sweeper with an explicit configuration.
    ///
    /// Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn start_with_config(engine: Arc<StorageEngine>, mut config: ExpiryConfig) -> Self {
        config.interval = sweep_interval(&config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        let task = tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Signals the sweeper to stop. Calling it more than once is harmless.
    pub fn stop(&self) {
        // send_replace updates the value even after the task has exited
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }

    /// Stops the sweeper and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sweep_interval(config: &ExpiryConfig) -> Duration {
    config.interval.max(MIN_SWEEP_INTERVAL)
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        // Re-check in case the signal raced with the timer.
        if *shutdown_rx.borrow() {
            return;
        }

        let expired = engine.cleanup_expired();

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!("Sweep found nothing to expire");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new(Duration::from_millis(50)));

        for i in 0..10 {
            engine.set(format!("key{}", i), "value");
        }
        assert_eq!(engine.len(), 10);

        let _sweeper = ExpirySweeper::start(Arc::clone(&engine));

        // Within 2 * TTL, without any get() touching the keys
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(engine.is_empty());
        assert!(engine.keys().is_empty());
        assert_eq!(engine.stats().expired, 10);
    }

    #[tokio::test]
    async fn test_sweeper_keeps_live_keys() {
        let engine = Arc::new(StorageEngine::new(Duration::from_secs(60)));
        engine.set("live", "value");

        let config = ExpiryConfig {
            interval: Duration::from_millis(10),
        };
        let _sweeper = ExpirySweeper::start_with_config(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.get("live"), Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_signal() {
        let engine = Arc::new(StorageEngine::new(Duration::from_millis(10)));
        let sweeper = ExpirySweeper::start(Arc::clone(&engine));

        sweeper.stop();
        sweeper.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sweeper.is_finished());

        engine.set("key", "value");
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Nothing sweeps any more, and get() never removes.
        assert_eq!(engine.get("key"), None);
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new(Duration::from_millis(10)));

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        engine.set("key", "value");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let config = ExpiryConfig::for_ttl(Duration::ZERO);
        assert_eq!(sweep_interval(&config), MIN_SWEEP_INTERVAL);

        let config = ExpiryConfig::for_ttl(Duration::from_secs(5));
        assert_eq!(sweep_interval(&config), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_ttl_sweeper_still_stops() {
        let engine = Arc::new(StorageEngine::new(Duration::ZERO));
        let sweeper = ExpirySweeper::start(Arc::clone(&engine));

        engine.set("key", "value");
        tokio::time::sleep(MIN_SWEEP_INTERVAL * 5).await;
        assert!(engine.is_empty());

        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("sweeper did not exit after shutdown");
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_task() {
        let engine = Arc::new(StorageEngine::new(Duration::from_secs(3600)));
        let sweeper = ExpirySweeper::start(engine);

        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("sweeper did not exit after shutdown");
    }
}
