// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use crate::reactor::{Reactor, TimerHandle};

struct FakeTimer {
    id: u64,
    remaining: Duration,
    callback: Option<Box<dyn FnOnce()>>,
}

/// A deterministic, manually-advanced stand-in for a real event-loop [`Reactor`].
///
/// Every `schedule_once` call is recorded with its relative delay rather than wired up to an
/// actual OS timer; [`advance`](Self::advance) moves all of them forward by a fixed amount and
/// runs whichever ones are now due. This is what lets timeout- and idle-sweep-sensitive tests run
/// in microseconds instead of waiting on real wall-clock timers.
#[derive(Default)]
pub struct FakeReactor {
    next_id: Cell<u64>,
    timers: RefCell<Vec<FakeTimer>>,
}

impl FakeReactor {
    /// Creates a reactor with no scheduled timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves fake time forward by `delta`, running the body of every timer whose delay has now
    /// fully elapsed. Callbacks that schedule further timers are only considered on a later call.
    pub fn advance(&self, delta: Duration) {
        let due = {
            let mut timers = self.timers.borrow_mut();
            for timer in timers.iter_mut() {
                timer.remaining = timer.remaining.saturating_sub(delta);
            }

            let mut due = Vec::new();
            timers.retain_mut(|timer| {
                if timer.remaining.is_zero() {
                    if let Some(callback) = timer.callback.take() {
                        due.push(callback);
                    }
                    false
                } else {
                    true
                }
            });
            due
        };

        for callback in due {
            callback();
        }
    }

    /// Returns how many timers are still outstanding (scheduled but neither fired nor cancelled).
    #[must_use]
    pub fn pending_timer_count(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Reactor for FakeReactor {
    fn schedule_once(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.timers.borrow_mut().push(FakeTimer {
            id,
            remaining: delay,
            callback: Some(callback),
        });
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers.borrow_mut().retain(|timer| timer.id != handle.0);
    }
}
