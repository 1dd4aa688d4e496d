//! Process-wide dispatch accounting and the submission circuit breaker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// Counters shared between the submission front end and the dispatch loop.
///
/// The enabled flag is a one-way circuit breaker: a terminal batch failure
/// clears it, and nothing re-arms it except an explicit [`enable`](Self::enable)
/// call. The counters and the flag are independent atomics with no
/// cross-field consistency requirement.
#[derive(Debug)]
pub struct DispatchAccounting {
    /// Bulk requests handed to the store and not yet completed.
    outstanding: AtomicU64,
    /// Cumulative submitted volume in bytes.
    volume_bytes: AtomicU64,
    enabled: AtomicBool,
    idle: Notify,
}

impl DispatchAccounting {
    pub fn new() -> Self {
        Self {
            outstanding: AtomicU64::new(0),
            volume_bytes: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            idle: Notify::new(),
        }
    }

    /// Record a batch handed to the store: one more outstanding request and
    /// `bytes` more submitted volume.
    pub fn before_dispatch(&self, bytes: u64) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.volume_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Record a batch completion. A terminal failure trips the breaker.
    pub fn after_dispatch(&self, succeeded: bool) {
        if !succeeded {
            self.enabled.store(false, Ordering::Release);
        }
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Re-arm the breaker. The core never calls this on its own.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn volume_bytes(&self) -> u64 {
        self.volume_bytes.load(Ordering::Acquire)
    }

    /// Wait until no bulk requests are outstanding, up to `max_wait`.
    /// Returns whether the count reached zero.
    pub async fn wait_idle(&self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;

        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register for the next notification before re-checking the
            // counter, so a completion in between cannot be missed.
            notified.as_mut().enable();

            if self.outstanding.load(Ordering::Acquire) == 0 {
                return true;
            }

            if time::timeout_at(deadline, notified).await.is_err() {
                return self.outstanding.load(Ordering::Acquire) == 0;
            }
        }
    }
}

impl Default for DispatchAccounting {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counters() {
        let accounting = DispatchAccounting::new();

        accounting.before_dispatch(100);
        accounting.before_dispatch(50);
        assert_eq!(accounting.outstanding(), 2);
        assert_eq!(accounting.volume_bytes(), 150);

        accounting.after_dispatch(true);
        assert_eq!(accounting.outstanding(), 1);
        // Volume is cumulative, never decremented.
        assert_eq!(accounting.volume_bytes(), 150);
    }

    #[test]
    fn test_breaker_trips_on_failure_and_stays_open() {
        let accounting = DispatchAccounting::new();
        assert!(accounting.is_enabled());

        accounting.before_dispatch(10);
        accounting.after_dispatch(false);
        assert!(!accounting.is_enabled());

        // A later success does not re-arm the breaker.
        accounting.before_dispatch(10);
        accounting.after_dispatch(true);
        assert!(!accounting.is_enabled());

        accounting.enable();
        assert!(accounting.is_enabled());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_nothing_outstanding() {
        let accounting = DispatchAccounting::new();
        assert!(accounting.wait_idle(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_completion() {
        let accounting = Arc::new(DispatchAccounting::new());
        accounting.before_dispatch(10);

        let waiter = tokio::spawn({
            let accounting = accounting.clone();
            async move { accounting.wait_idle(Duration::from_secs(5)).await }
        });

        tokio::task::yield_now().await;
        accounting.after_dispatch(true);

        assert!(waiter.await.expect("waiter panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_times_out() {
        let accounting = DispatchAccounting::new();
        accounting.before_dispatch(10);

        assert!(!accounting.wait_idle(Duration::from_millis(100)).await);
    }
}
