// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Opaque handle to a timer scheduled through [`Reactor::schedule_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// The event-loop abstraction the dispatcher is driven by.
///
/// The dispatcher never owns or drives an event loop itself - it is handed a `Reactor` at
/// construction and uses it only to schedule the timers that back task timeouts and the
/// periodic idle sweep. Waking the reactor thread up when a worker has enqueued a result is a
/// separate concern, handled by [`ReactorWaker`](crate::waker::ReactorWaker) and the embedder's
/// own [`Dispatcher::run_once`](crate::Dispatcher::run_once) integration point, since not every
/// reactor exposes a readiness-registration primitive the same way.
#[cfg_attr(test, mockall::automock)]
pub trait Reactor {
    /// Schedules `callback` to run once, after `delay`, on the reactor thread.
    fn schedule_once(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// Cancels a previously scheduled timer. A no-op if the timer already fired or was already
    /// cancelled.
    fn cancel(&self, handle: TimerHandle);
}
