//! Cooperative shutdown signal
//!
//! A single [`ShutdownHandle`] fans out to any number of [`Shutdown`]
//! receivers. Triggering is sticky: receivers created or polled after the
//! trigger observe it immediately.

use std::future::Future;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Sending half; triggers shutdown for every paired [`Shutdown`]
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half, observed by the control loop and in-flight passes
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/receiver pair
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another receiver for the same signal
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A receiver that is never triggered
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender leaves the value at false forever.
        drop(tx);
        Self { rx }
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested
    ///
    /// If the handle is dropped without triggering, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let triggered = rx.wait_for(|cancelled| *cancelled).await.map(|_| ()).is_ok();
        if !triggered {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` to completion unless shutdown wins the race
    ///
    /// A cancelled future is dropped and [`Error::Cancelled`] is returned.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_passes_through_result() {
        let (_handle, shutdown) = channel();
        let value = shutdown.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_guard_returns_cancelled_when_triggered_midway() {
        let (handle, shutdown) = channel();

        let slow = shutdown.guard(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });

        let trigger = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.trigger();
        };

        let (result, _) = tokio::join!(slow, trigger);
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_trigger_is_sticky() {
        let (handle, shutdown) = channel();
        handle.trigger();
        handle.trigger();

        assert!(shutdown.is_cancelled());
        assert!(handle.subscribe().is_cancelled());
        shutdown.cancelled().await;
        let result = shutdown.guard(async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_never_is_not_cancelled() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_cancelled());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), shutdown.cancelled())
            .await
            .is_err();
        assert!(timed_out);
    }
}
