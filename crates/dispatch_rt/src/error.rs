// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// A specialized `Result` type for Dispatch Runtime operations
/// that return a Dispatch Runtime [`Error`][enum@Error] on failure.
pub type Result<T> = std::result::Result<T, Error>;

/// An error originating in the Dispatch Runtime.
///
/// This is an umbrella type for every failure kind a submitted task's promise can be settled
/// with, plus the errors returned synchronously from dispatcher operations such as
/// [`set_option`](crate::Dispatcher::set_option). Future versions may add additional enum
/// variants.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The task resolved with `FAILURE`. The payload carries whatever message the task body
    /// (or the panic hook, if the task panicked) produced.
    #[error("task failed: {0}")]
    Task(String),

    /// The task's deadline (`TASK_TIMEOUT`) elapsed before it resolved. The owning worker is
    /// abandoned and replaced; the task itself is not retried.
    #[error("task timed out before it resolved")]
    Timeout,

    /// The worker executing this task lost its execution context (crashed, disconnected) before
    /// the task resolved.
    #[error("worker lost before task resolved")]
    WorkerLost,

    /// The task was still queued (or about to be queued) when the dispatcher was stopped.
    #[error("dispatcher was stopped before task could run")]
    Shutdown,

    /// The caller supplied invalid input at submission time: an unregistered callable name, or
    /// a submission made after the dispatcher has already stopped.
    #[error("{0}")]
    Submission(String),

    /// [`set_option`](crate::Dispatcher::set_option) was called with an unrecognized key or a
    /// value that is out of range for the key (e.g. `POOL_SIZE_MIN` greater than
    /// `POOL_SIZE_MAX`).
    #[error("{0}")]
    Option(String),
}
