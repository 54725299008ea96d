// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A cross-thread wakeup signal for the reactor thread.
///
/// Workers hold a clone of the dispatcher's `ReactorWaker` and call [`notify`](Self::notify)
/// whenever they push something onto the result channel, or whenever their underlying context
/// is about to go away (including an unexpected crash). `Dispatcher::run_once` blocks on
/// [`wait`](Self::wait), so the reactor thread sleeps until there's actually something for it
/// to do instead of busy-polling the result channel.
#[derive(Debug, Clone)]
pub struct ReactorWaker {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ReactorWaker {
    /// Creates a fresh, unsignalled waker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Signals the reactor thread. Safe to call from any thread, any number of times; redundant
    /// notifications before the reactor thread gets around to waiting are coalesced.
    #[mutants::skip]
    pub fn notify(&self) {
        *self.inner.0.lock().expect("waker mutex poisoned") = true;
        self.inner.1.notify_one();
    }

    /// Blocks the calling thread until [`notify`](Self::notify) has been called, or `timeout`
    /// elapses, whichever comes first.
    #[mutants::skip]
    pub fn wait(&self, timeout: Duration) {
        let mut signalled = self.inner.0.lock().expect("waker mutex poisoned");
        while !*signalled {
            let (guard, result) = self
                .inner
                .1
                .wait_timeout(signalled, timeout)
                .expect("waker mutex poisoned");
            signalled = guard;
            if result.timed_out() {
                return;
            }
        }
        *signalled = false;
    }
}

impl Default for ReactorWaker {
    fn default() -> Self {
        Self::new()
    }
}
