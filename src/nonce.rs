//! Server nonce lifecycle: generation and time-based rotation.

use crate::enums::Algorithm;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// A server nonce: an opaque, unguessable token bound to the time window it
/// was issued in.
#[derive(Debug, Clone, PartialEq)]
pub struct Nonce {
    /// Hex digest value sent in challenges and signed by clients
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

/// Owns the single current nonce and replaces it on a fixed schedule.
///
/// The nonce is an immutable value behind an atomically-replaceable handle:
/// rotation swaps the inner `Arc`, readers clone it. A reader can never
/// observe a partially written nonce.
pub struct NonceManager {
    current: RwLock<Arc<Nonce>>,
    algorithm: Algorithm,
}

impl NonceManager {
    /// Create a manager with a freshly generated nonce.
    ///
    /// # Errors
    /// If the system entropy source is unavailable.
    pub fn new() -> Result<Self> {
        Self::with_algorithm(Algorithm::default())
    }

    pub fn with_algorithm(algorithm: Algorithm) -> Result<Self> {
        let nonce = Self::generate_with(algorithm)?;
        Ok(Self {
            current: RwLock::new(Arc::new(nonce)),
            algorithm,
        })
    }

    /// The nonce active at call time. Safe to call concurrently with rotation.
    pub fn current(&self) -> Arc<Nonce> {
        self.current.read().clone()
    }

    /// Produce a new nonce: a second-granularity timestamp concatenated with
    /// a random integer, hashed. Unguessability comes from the random
    /// component, drawn from the operating system on every call.
    pub fn generate(&self) -> Result<Nonce> {
        Self::generate_with(self.algorithm)
    }

    fn generate_with(algorithm: Algorithm) -> Result<Nonce> {
        let issued_at = Utc::now();
        let stamp = issued_at.format("%Y:%m:%d:%H:%M:%S").to_string();

        let mut bytes = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::NonceGeneration(e.to_string()))?;
        let random = u32::from_be_bytes(bytes);

        Ok(Nonce {
            value: algorithm.hash_str(&format!("{}{}", stamp, random)),
            issued_at,
        })
    }

    /// Replace the current nonce with a freshly generated one.
    pub fn rotate(&self) -> Result<()> {
        let nonce = self.generate()?;
        self.publish(nonce);
        Ok(())
    }

    pub(crate) fn publish(&self, nonce: Nonce) {
        *self.current.write() = Arc::new(nonce);
    }

    /// Start the recurring background rotation.
    ///
    /// Every `interval` the current nonce is replaced wholesale; responses
    /// signed against the superseded nonce fail verification from that point
    /// on. A failed rotation keeps the previous nonce in place. The task runs
    /// until the shutdown signal fires.
    pub fn start(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let manager = self;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!("nonce rotation shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.rotate() {
                            Ok(()) => info!("refreshed server nonce"),
                            Err(err) => {
                                warn!(error = %err, "nonce rotation failed, keeping previous nonce");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_md5_hex_values() {
        let manager = NonceManager::new().unwrap();
        let nonce = manager.generate().unwrap();

        assert_eq!(nonce.value.len(), 32);
        assert!(nonce.value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_draws_fresh_randomness() {
        let manager = NonceManager::new().unwrap();
        let a = manager.generate().unwrap();
        let b = manager.generate().unwrap();

        // same second, different random component
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn rotate_replaces_current() {
        let manager = NonceManager::new().unwrap();
        let before = manager.current();

        manager.rotate().unwrap();

        let after = manager.current();
        assert_ne!(before.value, after.value);
    }

    #[test]
    fn publish_swaps_the_handle() {
        let manager = NonceManager::new().unwrap();
        manager.publish(Nonce {
            value: "abc123".to_string(),
            issued_at: Utc::now(),
        });

        assert_eq!(manager.current().value, "abc123");
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_task_replaces_nonce_on_schedule() {
        let manager = Arc::new(NonceManager::new().unwrap());
        let before = manager.current();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = Arc::clone(&manager).start(Duration::from_secs(120), shutdown_rx);

        // Let the spawned task poll once so it registers its interval timer
        // before we advance the paused clock.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(121)).await;
        tokio::task::yield_now().await;

        let after = manager.current();
        assert_ne!(before.value, after.value);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_task_holds_nonce_between_ticks() {
        let manager = Arc::new(NonceManager::new().unwrap());
        let before = manager.current();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = Arc::clone(&manager).start(Duration::from_secs(120), shutdown_rx);

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(manager.current().value, before.value);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
