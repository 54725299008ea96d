// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registers a named callable and invokes it through `Dispatcher::call`, the by-name shorthand
//! for submitting a [`Task`](dispatch_rt::Task).

use std::time::{Duration, Instant};

use dispatch_rt::{Dispatcher, FakeReactor, Value};

fn main() {
    let reactor = FakeReactor::new();
    let dispatcher = Dispatcher::new(reactor);

    dispatcher.register(
        "strlen",
        Box::new(|args| match args.as_slice() {
            [Value::Text(s)] => Ok(Value::Int(s.len() as i64)),
            _ => Err("strlen expects a single text argument".to_owned()),
        }),
    );

    let promise = dispatcher.call("strlen", vec![Value::Text("zanzibar!".to_owned())]);

    drive_until_settled(&dispatcher);

    match promise.recv() {
        Ok(value) => println!("strlen(\"zanzibar!\") = {value:?}"),
        Err(error) => println!("call failed: {error}"),
    }
}

/// Drives `dispatcher` on the current thread, advancing its `FakeReactor` in real time, until
/// every in-flight and queued task has settled. A real embedder would instead call `run_once`
/// from its own event-loop tick; this stands in for that loop in a standalone example.
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
