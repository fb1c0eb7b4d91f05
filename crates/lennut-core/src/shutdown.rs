//! Per-instance stop signal shared by a broker or agent and its tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One-shot stop signal
///
/// Clones observe the same state. The stopped flag flips exactly once and
/// is read by tasks that need to tell an intentional shutdown apart from a
/// real failure before they log.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    stopped: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new, running shutdown signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    ///
    /// Returns `true` only for the call that actually stopped the instance.
    pub fn trigger(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Whether shutdown has been requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Completes once shutdown has been requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_stopped());

        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_stopped());
    }

    #[test]
    fn test_clones_share_state() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();

        other.trigger();
        assert!(shutdown.is_stopped());
        assert!(!shutdown.trigger());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let shutdown = Shutdown::new();

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_after_trigger_is_ready() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), shutdown.cancelled())
            .await
            .expect("already-stopped signal should resolve immediately");
    }
}
