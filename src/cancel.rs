//! Cooperative cancellation for fan-out stages.
//!
//! The driver signals via a cancellation token. Fan-out loops check the
//! token before dispatching each new request; outstanding requests race
//! against it so they stop being awaited once cancellation fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cooperative cancellation token, cloneable and shareable across tasks.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal cancellation and wake anyone awaiting [`CancellationToken::cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Resolve once cancellation has been requested. Intended for use in
    /// `tokio::select!` alongside an in-flight request future.
    pub async fn cancelled(&self) {
        // Register interest before checking the flag: `Notify` only wakes
        // waiters that exist at the time of `notify_waiters`, so checking
        // first would race a `cancel()` landing between the check and the
        // await.
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
