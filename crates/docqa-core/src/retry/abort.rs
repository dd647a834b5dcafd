//! Cancellation for pending backoff waits.
//!
//! A caller that goes away (closed view, dropped command) aborts its token;
//! a retry loop sleeping between attempts wakes up and gives up instead of
//! firing another request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared abort flag that can also be awaited.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Idempotent.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `delay` unless aborted first. Returns false if the wait was aborted.
    pub async fn sleep(&self, delay: Duration) -> bool {
        if self.is_aborted() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => !self.is_aborted(),
            _ = self.aborted() => false,
        }
    }
}
