// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::{Cell, RefCell};

/// Identifies a single submitted task for the lifetime of its promise.
///
/// Assigned by the dispatcher at submission time and never reused.
pub type TaskId = u64;

/// A dynamically typed value carried across the worker/reactor boundary.
///
/// Both the positional arguments of a [`call`](crate::Dispatcher::call) and the success payload
/// of any task's [`Outcome`] are expressed in terms of this type, since the dispatcher transports
/// opaque task objects and has no notion of the embedder's own domain types.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// The absence of a meaningful value.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// Owned text.
    Text(String),
    /// Owned bytes.
    Bytes(Vec<u8>),
    /// An ordered list of values.
    List(Vec<Value>),
}

/// The result of having run a [`Task`] to completion.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The task resolved successfully with this value.
    Success(Value),
    /// The task resolved with a failure carrying this message.
    Failure(String),
}

/// A unit of work accepted by the dispatcher and handed to a worker thread for execution.
///
/// Implementations run entirely inside a worker context. `execute` must, before returning,
/// call [`Resolver::resolve`] on the resolver it is given exactly once. If it returns without
/// doing so, the worker treats this as a failure with a "task did not resolve" message; if it
/// panics, the worker catches the panic and resolves with the panic payload converted to a
/// string. Neither of these cases propagate to the dispatcher or the caller as a Rust panic.
pub trait Task: Send + 'static {
    /// Runs the task body, resolving `resolver` exactly once before returning.
    fn execute(self: Box<Self>, resolver: &Resolver);
}

/// Hands a [`Task`] its single settlement point.
///
/// A `Resolver` is created fresh for each task execution and is not `Send` or `Sync` - it is
/// only ever touched on the worker thread that is currently running the task.
#[derive(Debug, Default)]
pub struct Resolver {
    settled: Cell<bool>,
    outcome: RefCell<Option<Outcome>>,
}

impl Resolver {
    /// Settles the task with the given outcome.
    ///
    /// # Panics
    ///
    /// Panics if called more than once for the same task execution - a task is only ever allowed
    /// one settlement.
    pub fn resolve(&self, outcome: Outcome) {
        assert!(
            !self.settled.replace(true),
            "Resolver::resolve called more than once for the same task"
        );
        *self.outcome.borrow_mut() = Some(outcome);
    }

    /// Convenience for resolving with [`Outcome::Success`].
    pub fn succeed(&self, value: Value) {
        self.resolve(Outcome::Success(value));
    }

    /// Convenience for resolving with [`Outcome::Failure`].
    pub fn fail(&self, message: impl Into<String>) {
        self.resolve(Outcome::Failure(message.into()));
    }

    pub(crate) fn into_outcome(self) -> Option<Outcome> {
        self.outcome.into_inner()
    }
}

/// The boxed, thread-movable form every submitted [`Task`] is stored as once accepted.
pub(crate) type BoxedTask = Box<dyn Task>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(Value);

    impl Task for Echo {
        fn execute(self: Box<Self>, resolver: &Resolver) {
            resolver.succeed(self.0);
        }
    }

    #[test]
    fn resolver_records_single_settlement() {
        let resolver = Resolver::default();
        let task: BoxedTask = Box::new(Echo(Value::Int(42)));
        task.execute(&resolver);

        match resolver.into_outcome() {
            Some(Outcome::Success(Value::Int(42))) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    #[should_panic]
    fn resolver_rejects_double_settlement() {
        let resolver = Resolver::default();
        resolver.succeed(Value::Unit);
        resolver.succeed(Value::Unit);
    }

    #[test]
    fn unresolved_resolver_yields_no_outcome() {
        let resolver = Resolver::default();
        assert!(resolver.into_outcome().is_none());
    }
}
