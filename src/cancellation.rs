//! Cooperative cancellation.
//!
//! [`CancellationToken`] is shared between a caller and the work it started.
//! Synchronous code polls [`is_cancelled`](CancellationToken::is_cancelled)
//! at defined checkpoints (before each chunk read, while waiting on a
//! decoder subprocess); asynchronous code awaits
//! [`cancelled`](CancellationToken::cancelled), which also fires when an
//! optional deadline passes.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use framegrab::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//!
//! token.cancel();
//! assert!(token.is_cancelled());
//!
//! let expired = CancellationToken::new().with_timeout(Duration::ZERO);
//! assert!(expired.is_cancelled());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state: cancelling any clone cancels all of them. A token may
/// carry a deadline, after which it reports itself cancelled without anyone
/// calling [`cancel`](CancellationToken::cancel).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a clone of this token that additionally expires at `deadline`.
    ///
    /// The earlier of an existing deadline and `deadline` wins.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            inner: Arc::clone(&self.inner),
            deadline: Some(deadline),
        }
    }

    /// Return a clone of this token that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The deadline attached to this token, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Request cancellation.
    ///
    /// All clones of this token observe the cancellation, and every task
    /// waiting in [`cancelled`](CancellationToken::cancelled) is woken.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Check whether cancellation has been requested or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Wait until the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent `cancel`
            // cannot slip between the check and the wait.
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline.into()) => return,
                    }
                }
                None => notified.await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_keeps_earliest() {
        let token = CancellationToken::new();
        let near = Instant::now() + Duration::from_secs(5);
        let far = near + Duration::from_secs(60);

        let limited = token.with_deadline(near).with_deadline(far);
        assert_eq!(limited.deadline(), Some(near));
        assert!(token.deadline().is_none());
    }

    #[test]
    fn deadline_clone_shares_flag() {
        let token = CancellationToken::new();
        let limited = token.with_timeout(Duration::from_secs(3600));
        assert!(!limited.is_cancelled());

        token.cancel();
        assert!(limited.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_on_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        token.cancel();
        task.await.expect("waiter task panicked");
    }

    #[tokio::test]
    async fn cancelled_wakes_on_deadline() {
        let token = CancellationToken::new().with_timeout(Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("deadline should fire");
    }
}
