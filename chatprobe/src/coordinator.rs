// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Session coordinator
//
// Single-assignment hand-off of the control value from the stream producer
// to any number of waiting consumers. First publish wins; later publishes are
// ignored. Waiters block on a notifier with an exact deadline instead of
// polling.

use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Notify;

/// Write-once value shared between the producer and its waiters.
///
/// One coordinator belongs to exactly one probe run.
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    value: OnceLock<String>,
    published: Notify,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the control value.
    ///
    /// Returns `true` if this call set the value, `false` if a value was
    /// already present (the new one is discarded).
    pub fn publish(&self, value: impl Into<String>) -> bool {
        if self.value.set(value.into()).is_ok() {
            self.published.notify_waiters();
            true
        } else {
            false
        }
    }

    /// The published value, without waiting.
    pub fn current(&self) -> Option<&str> {
        self.value.get().map(String::as_str)
    }

    pub fn is_published(&self) -> bool {
        self.value.get().is_some()
    }

    /// Wait up to `timeout` for a value.
    ///
    /// Returns `None` if the deadline passes first. A publish that lands
    /// after the deadline is still recorded; it just isn't seen by this
    /// waiter.
    pub async fn await_value(&self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }

    async fn wait(&self) -> String {
        loop {
            // Register interest before checking, so a publish between the
            // check and the await still wakes us.
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.value.get() {
                return value.clone();
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{self, Instant};

    #[test]
    fn first_publish_wins() {
        let coordinator = SessionCoordinator::new();
        assert!(!coordinator.is_published());

        assert!(coordinator.publish("first"));
        assert!(!coordinator.publish("second"));

        assert_eq!(coordinator.current(), Some("first"));
    }

    #[tokio::test]
    async fn await_returns_first_value_after_double_publish() {
        let coordinator = SessionCoordinator::new();
        coordinator.publish("abc");
        coordinator.publish("xyz");

        let got = coordinator.await_value(Duration::from_secs(1)).await;
        assert_eq!(got.as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn await_times_out_at_deadline_without_publish() {
        let coordinator = SessionCoordinator::new();
        let start = Instant::now();

        let got = coordinator.await_value(Duration::from_secs(5)).await;

        assert_eq!(got, None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(5_100), "returned late: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_wakes_on_publish_before_deadline() {
        let coordinator = Arc::new(SessionCoordinator::new());

        let publisher = coordinator.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(300)).await;
            publisher.publish("cid-1");
        });

        let start = Instant::now();
        let got = coordinator.await_value(Duration::from_secs(60)).await;

        assert_eq!(got.as_deref(), Some("cid-1"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn many_waiters_all_see_the_same_value() {
        let coordinator = Arc::new(SessionCoordinator::new());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.await_value(Duration::from_secs(10)).await })
            })
            .collect();

        time::sleep(Duration::from_millis(50)).await;
        coordinator.publish("shared");
        coordinator.publish("late");

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().as_deref(), Some("shared"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_publish_is_kept_after_waiter_timed_out() {
        let coordinator = SessionCoordinator::new();

        assert_eq!(coordinator.await_value(Duration::from_millis(10)).await, None);
        assert!(coordinator.publish("late"));

        assert_eq!(coordinator.current(), Some("late"));
        assert_eq!(
            coordinator.await_value(Duration::from_millis(10)).await.as_deref(),
            Some("late")
        );
    }
}
