//! Cooperative cancellation handles for agent runs.
//!
//! A [`CancelHandle`] is kept by whoever owns a run (the host for the
//! foreground run, the registry for background tasks). The run itself gets a
//! [`CancelToken`] and is responsible for observing it. Cancelling is a
//! request, not a synchronous stop.

use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Run side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Create a linked handle/token pair.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CancelToken { rx })
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// If the owning handle is dropped without cancelling, this never
    /// resolves, so a run racing it in `select!` simply keeps going.
    pub async fn cancelled(&mut self) {
        let observed = self.rx.wait_for(|cancelled| *cancelled).await.map(|_| ());
        if observed.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn token_observes_cancel() {
        let (handle, mut token) = CancelHandle::new();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(token.is_cancelled());
        timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancelled future should resolve");
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, mut token) = CancelHandle::new();
        drop(handle);
        assert!(timeout(Duration::from_millis(50), token.cancelled())
            .await
            .is_err());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cloned_handles_share_signal() {
        let (handle, token) = CancelHandle::new();
        let other = handle.clone();
        let observer = token.clone();
        other.cancel();
        assert!(handle.is_cancelled());
        assert!(token.is_cancelled());
        assert!(observer.is_cancelled());
    }
}
