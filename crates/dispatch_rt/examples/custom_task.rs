// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Submits a user-defined [`Task`] directly via `Dispatcher::execute`, bypassing the callable
//! registry entirely. Shows both a success path and a failure path settling through the same
//! `Promise`.

use std::time::{Duration, Instant};

use dispatch_rt::{Dispatcher, FakeReactor, Resolver, Task, Value};

/// Multiplies two integers supplied at construction time.
struct Multiply(i64, i64);

impl Task for Multiply {
    fn execute(self: Box<Self>, resolver: &Resolver) {
        resolver.succeed(Value::Int(self.0 * self.1));
    }
}

/// A task that always fails, to demonstrate the `TaskError` path.
struct AlwaysFails;

impl Task for AlwaysFails {
    fn execute(self: Box<Self>, resolver: &Resolver) {
        resolver.fail("oh noes!!!");
    }
}

fn main() {
    let reactor = FakeReactor::new();
    let dispatcher = Dispatcher::new(reactor);

    let product = dispatcher.execute(Box::new(Multiply(6, 7)));
    let failure = dispatcher.execute(Box::new(AlwaysFails));

    drive_until_settled(&dispatcher);

    match product.recv() {
        Ok(value) => println!("multiply(6, 7) = {value:?}"),
        Err(error) => println!("multiply failed: {error}"),
    }
    match failure.recv() {
        Ok(value) => println!("unexpected success: {value:?}"),
        Err(error) => println!("always_fails settled with: {error}"),
    }
}

fn drive_until_settled(dispatcher: &Dispatcher<FakeReactor>) {
    let reactor = dispatcher.reactor();
    let mut last_tick = Instant::now();

    loop {
        dispatcher.run_once(Duration::from_millis(20));

        let now = Instant::now();
        reactor.advance(now.duration_since(last_tick));
        last_tick = now;

        if dispatcher.is_quiescent() {
            break;
        }
    }
}
