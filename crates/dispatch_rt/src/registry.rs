// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::task::{Outcome, Value};

/// Shared, thread-safe handle to a [`Registry`].
///
/// Lookups and invocations happen from worker threads while registration happens from the
/// reactor thread, so the registry itself lives behind a reader-writer lock: worker threads take
/// the read side to invoke a handler, the reactor thread briefly takes the write side to
/// register one.
pub(crate) type SharedRegistry = Arc<RwLock<Registry>>;

/// A worker-side handler backing one registered callable name.
///
/// Handlers run on whichever worker thread happens to execute a `call(name, ...)` task, so they
/// must be `Send + Sync`; they are invoked at most once per matching `call`.
pub type Handler = Box<dyn Fn(Vec<Value>) -> std::result::Result<Value, String> + Send + Sync>;

/// Maps callable names to worker-side handlers, backing the `call(name, args...)` shorthand.
///
/// Registration normally happens once, up front, before the dispatcher accepts any `call`
/// submissions; lookups happen on the worker thread (and, to reject unregistered names
/// synchronously, on the reactor thread at submit time too).
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any handler previously registered for it.
    pub fn register(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    /// Returns whether `name` currently has a registered handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Runs the handler registered for `name` with `args`, producing a task [`Outcome`].
    ///
    /// # Panics
    ///
    /// Panics if `name` is not registered - callers are expected to have already checked
    /// [`contains`](Self::contains) at submission time, since an unregistered name is a
    /// synchronous submission error, not a worker-side failure.
    pub(crate) fn invoke(&self, name: &str, args: Vec<Value>) -> Outcome {
        let handler = self
            .handlers
            .get(name)
            .expect("call task reached a worker with an unregistered callable name");

        match handler(args) {
            Ok(value) => Outcome::Success(value),
            Err(message) => Outcome::Failure(message),
        }
    }
}

/// The task packaged by [`Dispatcher::call`](crate::Dispatcher::call): looks `name` up in the
/// registry on the worker thread and runs whatever handler is registered for it.
///
/// An unregistered name is rejected synchronously at submission time (see
/// [`Registry::contains`]); by the time a `CallTask` actually reaches a worker, the name is known
/// to have been registered, though not necessarily still registered (a racing `register` call
/// could replace or the registry could in principle be emptied - in that unlikely case
/// [`Registry::invoke`] would panic, same as any other unregistered-name invocation).
pub(crate) struct CallTask {
    pub(crate) registry: SharedRegistry,
    pub(crate) name: String,
    pub(crate) args: Vec<Value>,
}

impl crate::task::Task for CallTask {
    fn execute(self: Box<Self>, resolver: &crate::task::Resolver) {
        let Self {
            registry,
            name,
            args,
        } = *self;
        let outcome = registry
            .read()
            .expect("registry lock poisoned")
            .invoke(&name, args);
        match outcome {
            Outcome::Success(value) => resolver.succeed(value),
            Outcome::Failure(message) => resolver.fail(message),
        }
    }
}
