// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Result};
use crate::task::Value;

/// A single-settlement deferred result, returned immediately by
/// [`call`](crate::Dispatcher::call) / [`execute`](crate::Dispatcher::execute).
///
/// `Promise` implements [`Future`] for callers driven by a reactor, and exposes a blocking
/// [`recv`](Self::recv) for callers that want to wait synchronously. Combinators such as `all`,
/// `any`, or `some` are not part of the core - build them atop the delivered value using
/// whichever future-combinator library the embedder already depends on.
#[derive(Debug)]
pub struct Promise {
    receiver: oneshot::Receiver<Result<Value>>,
}

impl Promise {
    pub(crate) fn new_pair() -> (Self, Deferred) {
        let (tx, rx) = oneshot::channel();
        (Self { receiver: rx }, Deferred { sender: Some(tx) })
    }

    /// Blocks the calling thread until the promise settles.
    ///
    /// This does not drive a reactor; if nothing else is polling the reactor on another thread,
    /// this call never returns. That matches the synchronous `wait()` semantics of the source
    /// ecosystem's promise library, which this type stands in for.
    pub fn recv(self) -> Result<Value> {
        self.receiver.recv().unwrap_or(Err(Error::WorkerLost))
    }
}

impl Future for Promise {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(Error::WorkerLost)))
    }
}

/// The dispatcher-held counterpart to a [`Promise`] - the one-shot settlement handle.
///
/// Dropping a `Deferred` without calling [`settle`](Self::settle) causes the paired `Promise` to
/// resolve with [`Error::WorkerLost`] rather than hang forever.
#[derive(Debug)]
pub(crate) struct Deferred {
    sender: Option<oneshot::Sender<Result<Value>>>,
}

impl Deferred {
    /// Settles the paired promise exactly once. Calling this consumes the handle, so the type
    /// system rules out a second settlement from the same `Deferred`.
    pub(crate) fn settle(mut self, result: Result<Value>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_delivers_value_to_blocking_recv() {
        let (promise, deferred) = Promise::new_pair();
        deferred.settle(Ok(Value::Int(42)));
        assert!(matches!(promise.recv(), Ok(Value::Int(42))));
    }

    #[test]
    fn dropped_deferred_resolves_worker_lost() {
        let (promise, deferred) = Promise::new_pair();
        drop(deferred);
        assert!(matches!(promise.recv(), Err(Error::WorkerLost)));
    }

    #[test]
    fn settle_delivers_error() {
        let (promise, deferred) = Promise::new_pair();
        deferred.settle(Err(Error::Timeout));
        assert!(matches!(promise.recv(), Err(Error::Timeout)));
    }
}
