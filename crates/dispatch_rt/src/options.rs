// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::error::{Error, Result};

/// Identifies one tunable recognized by [`Dispatcher::set_option`](crate::Dispatcher::set_option).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OptionKey {
    /// Floor on live workers.
    PoolSizeMin,
    /// Ceiling on live workers.
    PoolSizeMax,
    /// Per-task wall-clock bound.
    TaskTimeout,
    /// Tasks a worker runs before being recycled.
    ExecLimit,
    /// Opaque context-creation mask passed verbatim to worker spawn.
    ThreadFlags,
    /// Idle retirement threshold.
    IdleWorkerTimeout,
}

/// A value accepted or returned by [`Dispatcher::set_option`](crate::Dispatcher::set_option).
///
/// Each [`OptionKey`] only accepts one of these variants; passing the wrong shape of value for a
/// key is an [`Error::Option`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    /// A worker count, used for `PoolSizeMin` / `PoolSizeMax`.
    WorkerCount(usize),
    /// A duration in whole seconds; `None` means unbounded. Used for `TaskTimeout`.
    Seconds(Option<u64>),
    /// A task count; `None` means unbounded. Used for `ExecLimit`.
    TaskCount(Option<u64>),
    /// Opaque thread-creation flags. Used for `ThreadFlags`.
    ThreadFlags(u32),
}

/// The live set of tunables read by the dispatcher's scheduling and recycling logic.
///
/// Constructed with documented defaults via [`Default`] / [`Options::builder`], and mutated at
/// runtime exclusively through [`Options::set`], which enforces the same validation as
/// [`Dispatcher::set_option`](crate::Dispatcher::set_option).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pool_size_min: usize,
    pool_size_max: usize,
    task_timeout: Option<Duration>,
    exec_limit: Option<u64>,
    thread_flags: u32,
    idle_worker_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pool_size_min: 1,
            pool_size_max: 8,
            task_timeout: Some(Duration::from_secs(30)),
            exec_limit: Some(1024),
            thread_flags: 0,
            idle_worker_timeout: Duration::from_secs(10),
        }
    }
}

impl Options {
    /// Starts a fluent builder seeded with the documented defaults.
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub(crate) const fn pool_size_min(&self) -> usize {
        self.pool_size_min
    }

    pub(crate) const fn pool_size_max(&self) -> usize {
        self.pool_size_max
    }

    pub(crate) const fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout
    }

    pub(crate) const fn exec_limit(&self) -> Option<u64> {
        self.exec_limit
    }

    pub(crate) const fn thread_flags(&self) -> u32 {
        self.thread_flags
    }

    pub(crate) const fn idle_worker_timeout(&self) -> Duration {
        self.idle_worker_timeout
    }

    fn get(&self, key: OptionKey) -> OptionValue {
        match key {
            OptionKey::PoolSizeMin => OptionValue::WorkerCount(self.pool_size_min),
            OptionKey::PoolSizeMax => OptionValue::WorkerCount(self.pool_size_max),
            OptionKey::TaskTimeout => {
                OptionValue::Seconds(self.task_timeout.map(|d| d.as_secs()))
            }
            OptionKey::ExecLimit => OptionValue::TaskCount(self.exec_limit),
            OptionKey::ThreadFlags => OptionValue::ThreadFlags(self.thread_flags),
            OptionKey::IdleWorkerTimeout => {
                OptionValue::Seconds(Some(self.idle_worker_timeout.as_secs()))
            }
        }
    }

    /// Validates and applies `value` for `key`, returning the prior value.
    ///
    /// Does not retroactively alter running tasks or already-spawned workers; the new value
    /// takes effect on the next relevant decision (spawn, assign, recycle, sweep).
    pub(crate) fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<OptionValue> {
        let prior = self.get(key);

        match (key, value) {
            (OptionKey::PoolSizeMin, OptionValue::WorkerCount(min)) => {
                if min > self.pool_size_max {
                    return Err(Error::Option(format!(
                        "POOL_SIZE_MIN ({min}) cannot exceed POOL_SIZE_MAX ({})",
                        self.pool_size_max
                    )));
                }
                self.pool_size_min = min;
            }
            (OptionKey::PoolSizeMax, OptionValue::WorkerCount(max)) => {
                if max < self.pool_size_min {
                    return Err(Error::Option(format!(
                        "POOL_SIZE_MAX ({max}) cannot be less than POOL_SIZE_MIN ({})",
                        self.pool_size_min
                    )));
                }
                self.pool_size_max = max;
            }
            (OptionKey::TaskTimeout, OptionValue::Seconds(seconds)) => {
                self.task_timeout = seconds.filter(|&s| s > 0).map(Duration::from_secs);
            }
            (OptionKey::ExecLimit, OptionValue::TaskCount(limit)) => {
                self.exec_limit = limit.filter(|&n| n > 0);
            }
            (OptionKey::ThreadFlags, OptionValue::ThreadFlags(flags)) => {
                self.thread_flags = flags;
            }
            (OptionKey::IdleWorkerTimeout, OptionValue::Seconds(Some(seconds))) => {
                self.idle_worker_timeout = Duration::from_secs(seconds);
            }
            (key, value) => {
                return Err(Error::Option(format!(
                    "value {value:?} is not valid for option {key:?}"
                )));
            }
        }

        Ok(prior)
    }
}

/// Fluent construction-time configuration for a [`Dispatcher`](crate::Dispatcher), mirroring the
/// documented defaults of [`Options`] exactly unless overridden.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Sets the floor on live workers.
    #[must_use]
    pub const fn with_pool_size_min(mut self, min: usize) -> Self {
        self.options.pool_size_min = min;
        self
    }

    /// Sets the ceiling on live workers.
    #[must_use]
    pub const fn with_pool_size_max(mut self, max: usize) -> Self {
        self.options.pool_size_max = max;
        self
    }

    /// Sets the per-task wall-clock bound. `None` means unbounded.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.task_timeout = timeout;
        self
    }

    /// Sets how many tasks a worker runs before being recycled. `None` means unbounded.
    #[must_use]
    pub const fn with_exec_limit(mut self, limit: Option<u64>) -> Self {
        self.options.exec_limit = limit;
        self
    }

    /// Sets the opaque context-creation mask passed verbatim to worker spawn.
    #[must_use]
    pub const fn with_thread_flags(mut self, flags: u32) -> Self {
        self.options.thread_flags = flags;
        self
    }

    /// Sets the idle retirement threshold.
    #[must_use]
    pub const fn with_idle_worker_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_worker_timeout = timeout;
        self
    }

    /// Finishes the builder, yielding the configured [`Options`].
    #[must_use]
    pub fn build(self) -> Options {
        self.options
    }
}
