// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates pool elasticity and graceful shutdown: a single-worker pool works through a
//! FIFO backlog, then `stop()` cancels anything still queued while letting the in-flight task
//! finish naturally.

use std::time::{Duration, Instant};

use dispatch_rt::{Dispatcher, FakeReactor, Options, Resolver, Task, Value};

struct SlowSquare(i64);

impl Task for SlowSquare {
    fn execute(self: Box<Self>, resolver: &Resolver) {
        std::thread::sleep(Duration::from_millis(50));
        resolver.succeed(Value::Int(self.0 * self.0));
    }
}

fn main() {
    let reactor = FakeReactor::new();
    let options = Options::builder()
        .with_pool_size_min(0)
        .with_pool_size_max(1)
        .build();
    let dispatcher = Dispatcher::with_options(reactor, options);

    let promises: Vec<_> = (1..=3)
        .map(|n| dispatcher.execute(Box::new(SlowSquare(n))))
        .collect();

    drive_until_settled(&dispatcher);

    for (n, promise) in (1..=3).zip(promises) {
        match promise.recv() {
            Ok(value) => println!("square({n}) = {value:?}"),
            Err(error) => println!("square({n}) failed: {error}"),
        }
    }

    // The sole worker is idle again; the next submission keeps it busy and the one after that
    // has nowhere to go but the queue.
    let inflight = dispatcher.execute(Box::new(SlowSquare(4)));
    let queued = dispatcher.execute(Box::new(SlowSquare(99)));

    // stop() cancels anything still queued immediately, but lets the in-flight task finish.
    dispatcher.stop();
    match queued.recv() {
        Err(error) => println!("queued submission settled with: {error}"),
        Ok(value) => println!("unexpectedly ran: {value:?}"),
    }

    drive_until_settled(&dispatcher);
    match inflight.recv() {
        Ok(value) => println!("in-flight task still completed: {value:?}"),
        Err(error) => println!("in-flight task settled with: {error}"),
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
