// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Runner-side handle used to tell a task it has been given up on.
#[derive(Debug, Clone)]
pub struct AbandonHandle {
    inner: Arc<Inner>,
}

/// Task-side view of the abandon request.
///
/// Tasks are never killed; they are expected to watch this signal at their
/// suspension points and release what they hold (close the stream).
#[derive(Debug, Clone)]
pub struct AbandonSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    abandoned: AtomicBool,
    notify: Notify,
}

impl AbandonHandle {
    pub fn new() -> (Self, AbandonSignal) {
        let inner = Arc::new(Inner {
            abandoned: AtomicBool::new(false),
            notify: Notify::new(),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            AbandonSignal { inner },
        )
    }

    pub fn abandon(&self) {
        if !self.inner.abandoned.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }
}

impl AbandonSignal {
    pub fn is_abandoned(&self) -> bool {
        self.inner.abandoned.load(Ordering::SeqCst)
    }

    /// Resolve once the runner has abandoned the task.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_abandoned() {
                return;
            }
            notified.await;
        }
    }
}
