// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A non-blocking façade over a pool of OS worker threads that run otherwise synchronous,
//! potentially long-running tasks on behalf of a single-threaded, cooperatively scheduled event
//! loop.
//!
//! The caller submits a [`Task`] (or a [`Dispatcher::call`] by name, via the [`Registry`]) and
//! immediately gets back a [`Promise`]. A worker thread runs the task to completion; its outcome
//! is carried back across the worker/reactor boundary and settles the promise on whichever thread
//! drives [`Dispatcher::run_once`]. This lets an event-loop program invoke blocking operations -
//! filesystem I/O, CPU-bound work, legacy synchronous libraries - without stalling the loop.
//!
//! The [`Dispatcher`] owns the worker-pool lifecycle (elastic scaling between
//! [`OptionKey::PoolSizeMin`] and [`OptionKey::PoolSizeMax`], per-task timeouts, recycling after
//! [`OptionKey::ExecLimit`] tasks, crash recovery) and is driven by an embedder-supplied
//! [`Reactor`] for timer scheduling. It never performs distributed execution, persistent queuing,
//! priority fairness, or work-stealing - see the crate-level design notes for why those are left
//! to other layers.

mod dispatcher;
mod error;
mod fake_reactor;
mod options;
mod promise;
mod reactor;
mod registry;
mod task;
mod waker;
mod worker;

pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use fake_reactor::FakeReactor;
pub use options::{OptionKey, OptionValue, Options, OptionsBuilder};
pub use promise::Promise;
pub use reactor::{Reactor, TimerHandle};
pub use registry::{Handler, Registry};
pub use task::{Outcome, Resolver, Task, TaskId, Value};
pub use waker::ReactorWaker;
pub use worker::{StartTask, WorkerCrash, WorkerId};
